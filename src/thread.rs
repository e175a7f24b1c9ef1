//! Per-thread symbolic state: guard, call stack, program counter.

crate::prelude!();

use rename::{Level1, Level2};

#[cfg(test)]
mod test;

/// A path guard, as a list of conjuncts.
///
/// The empty guard is `true`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Guard {
    conjuncts: Vec<Expr>,
}
impl Guard {
    /// The `true` guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Conjuncts accessor.
    pub fn conjuncts(&self) -> &[Expr] {
        &self.conjuncts
    }

    /// Adds a conjunct, flattens conjunctions.
    pub fn add(&mut self, expr: Expr) {
        match expr.simplify() {
            Expr::App {
                op: Op::And,
                args,
            } => {
                for arg in args {
                    self.add(arg)
                }
            }
            expr if expr.is_true() => (),
            expr if expr.is_false() => self.conjuncts = vec![expr],
            expr => {
                if !self.is_false() && !self.conjuncts.contains(&expr) {
                    self.conjuncts.push(expr)
                }
            }
        }
    }

    /// Makes the guard `false`.
    pub fn make_false(&mut self) {
        self.conjuncts = vec![false.into()]
    }

    /// True if the guard is trivially `false`.
    pub fn is_false(&self) -> bool {
        self.conjuncts.iter().any(Expr::is_false)
    }
    /// True if the guard is trivially `true`.
    pub fn is_true(&self) -> bool {
        self.conjuncts.is_empty()
    }

    /// Conjunction of the conjuncts.
    pub fn as_expr(&self) -> Expr {
        Expr::and(self.conjuncts.clone())
    }

    /// Length of the longest common prefix of two guards.
    fn common_prefix(&self, other: &Self) -> usize {
        self.conjuncts
            .iter()
            .zip(other.conjuncts.iter())
            .take_while(|(lft, rgt)| lft == rgt)
            .count()
    }

    /// Removes the longest prefix `self` has in common with `other`.
    pub fn remove_prefix(&mut self, other: &Self) {
        let prefix = self.common_prefix(other);
        let _ = self.conjuncts.drain(0..prefix);
    }

    /// Disjunction of two guards, factors their common prefix.
    pub fn merge(&mut self, other: &Self) {
        if other.is_false() {
            return;
        }
        if self.is_false() {
            *self = other.clone();
            return;
        }
        let prefix = self.common_prefix(other);
        let lft = Expr::and(self.conjuncts[prefix..].to_vec());
        let rgt = Expr::and(other.conjuncts[prefix..].to_vec());
        self.conjuncts.truncate(prefix);
        self.add(Expr::or(vec![lft, rgt]))
    }

    /// Replaces a conjunct by another one.
    ///
    /// All occurrences of `old` are removed, `new` is then added.
    pub fn replace(&mut self, old: Option<&Expr>, new: Expr) {
        if let Some(old) = old {
            self.conjuncts.retain(|conj| conj != old)
        }
        self.add(new)
    }
}
impl fmt::Display for Guard {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.as_expr().fmt(fmt)
    }
}

/// A state waiting to be merged at some location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotoState {
    /// Guard of the state.
    pub guard: Guard,
    /// Level-2 context of the state.
    pub level2: Level2,
}

/// A call frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Function executed.
    pub function: String,
    /// Level-1 context.
    pub level1: Level1,
    /// Where to resume in the caller.
    pub calling_location: Option<Loc>,
    /// Level-1 renamed expression receiving the returned value.
    pub return_lhs: Option<Expr>,
    /// States waiting to be merged, by instruction index.
    pub goto_states: Map<usize, Vec<GotoState>>,
    /// Iterations of each backward goto, by instruction index.
    pub loop_iterations: Map<usize, usize>,
}
impl Frame {
    /// Constructor.
    pub fn new(function: impl Into<String>, level1: Level1) -> Self {
        Self {
            function: function.into(),
            level1,
            calling_location: None,
            return_lhs: None,
            goto_states: Map::new(),
            loop_iterations: Map::new(),
        }
    }
}

/// Per-thread state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadState {
    /// Thread index.
    thread_id: ThreadId,
    /// Current location.
    pub pc: Loc,
    /// Call stack, innermost frame last.
    pub call_stack: Vec<Frame>,
    /// Path guard.
    pub guard: Guard,
    /// True once the thread has reached the end of its root function.
    pub ended: bool,
    /// Number of declarations so far, by original identifier.
    decl_counts: Map<String, usize>,
}
impl ThreadState {
    /// Thread at the beginning of a function.
    pub fn new(thread_id: ThreadId, function: &str) -> Self {
        Self {
            thread_id,
            pc: Loc::new(function, 0),
            call_stack: vec![Frame::new(function, Level1::new(thread_id))],
            guard: Guard::new(),
            ended: false,
            decl_counts: Map::new(),
        }
    }

    /// Thread index.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Innermost frame.
    ///
    /// # Panics
    ///
    /// - if the call stack is empty.
    pub fn top(&self) -> &Frame {
        self.call_stack
            .last()
            .expect("[fatal] accessing the frame of a thread with an empty call stack")
    }
    /// Innermost frame (mutable).
    ///
    /// # Panics
    ///
    /// - if the call stack is empty.
    pub fn top_mut(&mut self) -> &mut Frame {
        self.call_stack
            .last_mut()
            .expect("[fatal] accessing the frame of a thread with an empty call stack")
    }

    /// True if the thread can take a step.
    pub fn can_continue(&self) -> bool {
        !self.ended && !self.call_stack.is_empty()
    }

    /// Fresh declaration version for an identifier.
    pub fn fresh_version(&mut self, id: &str) -> usize {
        let count = self.decl_counts.entry(id.into()).or_insert(0);
        *count += 1;
        *count
    }

    /// Declares a new version of a local in the innermost frame, returns its level-1 name.
    ///
    /// The level-1 name is registered in `level2`'s reverse map.
    pub fn declare(&mut self, id: &str, level2: &mut Level2) -> String {
        let version = self.fresh_version(id);
        let l1 = self.top_mut().level1.declare(id, version);
        level2.register_original(l1.clone(), id);
        l1
    }

    /// Location number of the current instruction, `None` if the thread cannot continue.
    pub fn location_number(&self, program: &program::Program) -> Option<usize> {
        if !self.can_continue() {
            return None;
        }
        program.instruction(&self.pc).map(|instr| instr.location)
    }
}
