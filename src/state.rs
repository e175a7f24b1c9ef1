//! Execution states.
//!
//! An [`ExecutionState`] is one explored path of a multi-threaded program: the state of every
//! thread, the level-2 renaming context shared by these threads, and the MPOR bookkeeping. It
//! steps the active thread one instruction at a time, and lets a driver decide at context-switch
//! points which thread runs next.
//!
//! The ordinary, thread-local part of symbolic execution lives in the `symex` module.

crate::prelude!();

use conf::Strategy;
use mpor::Mpor;
use program::{Kind, Program};
use rename::{Flavor, Level2};
use target::{Sink, Step, Target};
use thread::ThreadState;

#[cfg(test)]
mod test;

/// Identifier of the guard symbols synthesized at context switches.
pub const GUARD_EXEC: &str = "\\guard_exec";

/// Source of node ids, shared by all the states derived from the same root state.
#[derive(Debug, Clone)]
pub struct NodeCounter {
    next: Rc<Cell<NodeId>>,
}
impl Default for NodeCounter {
    fn default() -> Self {
        Self::new()
    }
}
impl NodeCounter {
    /// Counter starting at `1`, `0` is the node of names never assigned.
    pub fn new() -> Self {
        Self {
            next: Rc::new(Cell::new(1)),
        }
    }
    /// Fresh node id.
    pub fn next(&self) -> NodeId {
        let id = self.next.get();
        self.next.set(id + 1);
        id
    }
    /// Next node id, without allocating it.
    pub fn peek(&self) -> NodeId {
        self.next.get()
    }
}

/// Claim counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Claims {
    /// Claims encountered.
    pub total: usize,
    /// Claims that are not trivially true.
    pub remaining: usize,
}
impl Claims {
    fn add(&mut self, trivial: bool) {
        self.total += 1;
        if !trivial {
            self.remaining += 1
        }
    }
}

/// Thread status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Running outside of an atomic section.
    Running,
    /// Inside an atomic section.
    Atomic,
    /// Ended.
    Ended,
}

/// An execution state.
pub struct ExecutionState {
    /// Program.
    pub(crate) program: Rc<Program>,
    /// Configuration.
    pub(crate) conf: Rc<Conf>,
    /// Sink strategy.
    strategy: Strategy,
    /// Thread states, by thread id.
    pub(crate) threads: Vec<ThreadState>,
    /// Active thread.
    pub(crate) active_thread: ThreadId,
    /// Thread active before the last context switch.
    last_active_thread: ThreadId,
    /// Atomic nesting, by thread id.
    atomic_numbers: Vec<usize>,
    /// MPOR bookkeeping.
    mpor: Mpor,
    /// Level-2 renaming context.
    pub(crate) level2: Level2,
    /// Node id source.
    node_counter: NodeCounter,
    /// Current node.
    pub(crate) node_id: NodeId,
    /// Number of context switches so far.
    cs_number: usize,
    /// Forces a context switch at the end of the current transition.
    pub(crate) cswitch_forced: bool,
    /// True once the path is known to be infeasible.
    interleaving_unviable: bool,
    /// Threads already explored from the current context-switch point.
    dfs_traversed: Vec<bool>,
    /// Guard term currently propagated to all threads.
    exec_guard: Option<Expr>,
    /// Thread requested by the last switch-to instruction.
    requested_switch: Option<ThreadId>,
    /// Claims of this path.
    pub(crate) claims: Claims,
    /// Claims of the whole run, schedule mode only.
    shared_claims: Option<Rc<Cell<Claims>>>,
    /// Decision-procedure sink.
    pub(crate) sink: Sink,
}

impl ExecutionState {
    /// Initial state: thread `0` at the beginning of the entry point.
    pub fn new(program: Rc<Program>, conf: Rc<Conf>, target: Box<dyn Target>) -> Res<Self> {
        let entry = program.entry(&conf.entry_point)?.name.clone();
        program.check()?;
        let strategy = conf.strategy();
        let flavor = if conf.state_hashing {
            Flavor::StateHashing
        } else {
            Flavor::Plain
        };
        let level2 = Level2::new(flavor, conf.max_with_depth);
        let node_counter = NodeCounter::new();
        let node_id = node_counter.next();
        let shared_claims = if strategy == Strategy::Schedule {
            Some(Rc::new(Cell::new(Claims::default())))
        } else {
            None
        };
        debug!(
            "new execution state at `{}`, {} strategy",
            entry, strategy
        );

        Ok(Self {
            program,
            conf,
            strategy,
            threads: vec![ThreadState::new(0, &entry)],
            active_thread: 0,
            last_active_thread: 0,
            atomic_numbers: vec![0],
            mpor: Mpor::new(),
            level2,
            node_counter,
            node_id,
            cs_number: 0,
            cswitch_forced: false,
            interleaving_unviable: false,
            dfs_traversed: vec![false],
            exec_guard: None,
            requested_switch: None,
            claims: Claims::default(),
            shared_claims,
            sink: Sink::new(target, strategy),
        })
    }

    /// Deep copy of the state.
    ///
    /// The copy shares the node counter and, depending on the strategy, the sink.
    pub fn try_clone(&self) -> Res<Self> {
        Ok(Self {
            program: self.program.clone(),
            conf: self.conf.clone(),
            strategy: self.strategy,
            threads: self.threads.clone(),
            active_thread: self.active_thread,
            last_active_thread: self.last_active_thread,
            atomic_numbers: self.atomic_numbers.clone(),
            mpor: self.mpor.clone(),
            level2: self.level2.clone(),
            node_counter: self.node_counter.clone(),
            node_id: self.node_id,
            cs_number: self.cs_number,
            cswitch_forced: self.cswitch_forced,
            interleaving_unviable: self.interleaving_unviable,
            dfs_traversed: self.dfs_traversed.clone(),
            exec_guard: self.exec_guard.clone(),
            requested_switch: self.requested_switch,
            claims: self.claims,
            shared_claims: self.shared_claims.clone(),
            sink: self.sink.fork(self.strategy)?,
        })
    }

    /// Program accessor.
    pub fn program(&self) -> &Program {
        &self.program
    }
    /// Configuration accessor.
    pub fn conf(&self) -> &Conf {
        &self.conf
    }
    /// Strategy accessor.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
    /// Number of threads.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
    /// Thread states.
    pub fn threads(&self) -> &[ThreadState] {
        &self.threads
    }
    /// Active thread index.
    pub fn active_thread(&self) -> ThreadId {
        self.active_thread
    }
    /// Thread active before the last context switch.
    pub fn last_active_thread(&self) -> ThreadId {
        self.last_active_thread
    }
    /// Thread state of a thread.
    ///
    /// # Panics
    ///
    /// - if `tid` is not a thread index.
    pub fn thread(&self, tid: ThreadId) -> &ThreadState {
        match self.threads.get(tid) {
            Some(thread) => thread,
            None => panic!(
                "[fatal] thread index {} out of range, {} thread(s) live",
                tid,
                self.threads.len()
            ),
        }
    }
    /// Active thread state.
    pub fn active(&self) -> &ThreadState {
        self.thread(self.active_thread)
    }
    /// Active thread state (mutable).
    pub(crate) fn active_mut(&mut self) -> &mut ThreadState {
        &mut self.threads[self.active_thread]
    }
    /// Status of a thread.
    pub fn status(&self, tid: ThreadId) -> Status {
        if !self.thread(tid).can_continue() {
            Status::Ended
        } else if self.atomic_numbers[tid] > 0 {
            Status::Atomic
        } else {
            Status::Running
        }
    }
    /// Atomic nesting of a thread.
    pub fn atomic_number(&self, tid: ThreadId) -> usize {
        self.atomic_numbers[tid]
    }
    /// MPOR bookkeeping.
    pub fn mpor(&self) -> &Mpor {
        &self.mpor
    }
    /// Level-2 renaming context.
    pub fn level2(&self) -> &Level2 {
        &self.level2
    }
    /// Current node.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }
    /// Number of context switches so far.
    pub fn cs_number(&self) -> usize {
        self.cs_number
    }
    /// True if a context switch is forced.
    pub fn cswitch_forced(&self) -> bool {
        self.cswitch_forced
    }
    /// Forces a context switch at the end of the current transition.
    pub fn force_cswitch(&mut self) {
        self.cswitch_forced = true
    }
    /// True if the path is known to be infeasible.
    pub fn interleaving_unviable(&self) -> bool {
        self.interleaving_unviable
    }
    /// Thread requested by the last switch-to instruction.
    pub fn requested_switch(&self) -> Option<ThreadId> {
        self.requested_switch
    }
    /// Claims of this path.
    pub fn claims(&self) -> Claims {
        self.claims
    }
    /// Claims of the whole run, schedule mode only.
    pub fn total_claims(&self) -> Option<Claims> {
        self.shared_claims.as_ref().map(|claims| claims.get())
    }
    /// Steps recorded by the sink so far.
    pub fn steps(&self) -> Vec<Step> {
        self.sink.steps()
    }
    /// Applies something to the sink.
    pub fn with_target<T>(&mut self, f: impl FnOnce(&mut dyn Target) -> Res<T>) -> Res<T> {
        self.sink.with(f)
    }

    /// Provenance of the current instruction of the active thread.
    pub(crate) fn source(&self) -> Source {
        let thread = self.active();
        let location = self
            .program
            .instruction(&thread.pc)
            .map(|instr| instr.location)
            .unwrap_or(0);
        Source::new(thread.pc.function.clone(), location, self.active_thread)
    }

    /// Counts a claim.
    pub(crate) fn count_claim(&mut self, trivial: bool) {
        self.claims.add(trivial);
        if let Some(shared) = &self.shared_claims {
            let mut claims = shared.get();
            claims.add(trivial);
            shared.set(claims)
        }
    }
}

/// Stepping.
impl ExecutionState {
    /// Executes one instruction of the active thread.
    pub fn symex_step(&mut self) -> Res<()> {
        if !self.can_execution_continue() {
            bail!(
                "cannot step thread {}: it has ended",
                self.active_thread
            )
        }
        self.merge_gotos()?;

        let instr = match self.program.instruction(&self.active().pc) {
            Some(instr) => instr.clone(),
            None => bail!("thread {} is out of its function", self.active_thread),
        };

        if self.conf.symex_trace {
            trace!(
                "thread {} | {} (location {}) | {:?}",
                self.active_thread,
                self.active().pc,
                instr.location,
                instr.kind
            )
        }
        if self.conf.break_at == Some(instr.location) {
            info!(
                "break point: thread {} reached location {}",
                self.active_thread, instr.location
            )
        }

        let guard_false = self.active().guard.is_false();
        if guard_false && !instr.kind.is_control_flow() {
            self.active_mut().pc.index += 1;
            return Ok(());
        }

        match &instr.kind {
            Kind::EndFunction if self.active().call_stack.len() == 1 => self.end_thread(),
            Kind::AtomicBegin => {
                self.active_mut().pc.index += 1;
                self.atomic_numbers[self.active_thread] += 1;
            }
            Kind::AtomicEnd => {
                let tid = self.active_thread;
                self.atomic_numbers[tid] = self.atomic_numbers[tid].saturating_sub(1);
                self.active_mut().pc.index += 1;
                if !guard_false {
                    self.force_cswitch()
                }
            }
            Kind::Return(value) => {
                if !guard_false {
                    let value = value.clone();
                    self.symex_return(value.as_ref())?;
                    if let Some(value) = &value {
                        self.analyze_read(value);
                    }
                    if let Some(lhs) = self.active().top().return_lhs.clone() {
                        self.analyze_assign_l1(&lhs);
                    }
                }
                self.active_mut().pc.index += 1;
            }
            Kind::StartThread(function) => {
                let function = function.clone();
                let _ = self.program.get_function(&function)?;
                let tid = self.add_thread(&function);
                debug!(
                    "thread {} started thread {} running `{}`",
                    self.active_thread, tid, function
                );
                self.active_mut().pc.index += 1;
            }
            Kind::Yield => {
                self.active_mut().pc.index += 1;
                self.force_cswitch()
            }
            Kind::SwitchTo(tid) => {
                self.requested_switch = Some(*tid);
                self.active_mut().pc.index += 1;
                self.force_cswitch()
            }
            kind => {
                self.symex_base(kind)?;
                self.analyze_kind(kind)
            }
        }
        Ok(())
    }

    /// Marks the active thread as ended, forces a context switch.
    fn end_thread(&mut self) {
        let tid = self.active_thread;
        debug!("thread {} ended", tid);
        self.threads[tid].ended = true;
        self.atomic_numbers[tid] = 0;
        self.force_cswitch()
    }

    /// Records the globals an instruction accesses.
    fn analyze_kind(&mut self, kind: &Kind) {
        if self.threads.len() < 2 {
            return;
        }
        match kind {
            Kind::Assign { lhs, rhs } => {
                self.analyze_assign(lhs);
                self.analyze_read(rhs)
            }
            Kind::Assume(cond) | Kind::Goto { cond, .. } | Kind::Assert { cond, .. } => {
                self.analyze_read(cond)
            }
            Kind::Call { lhs, args, .. } => {
                // The callee frame is on top, arguments belong to the caller.
                let depth = self.active().call_stack.len();
                for arg in args {
                    self.analyze_read_at(arg, depth - 2)
                }
                if let Some(lhs) = lhs {
                    self.analyze_assign_at(lhs, depth - 2)
                }
            }
            Kind::Decl(_)
            | Kind::Return(_)
            | Kind::EndFunction
            | Kind::AtomicBegin
            | Kind::AtomicEnd
            | Kind::StartThread(_)
            | Kind::Yield
            | Kind::SwitchTo(_)
            | Kind::Skip => (),
        }
    }

    /// Globals appearing in an expression, in a frame of the active thread.
    ///
    /// Operands of address-of are not accesses. Guard symbols and allocation bookkeeping are
    /// ignored.
    fn get_expr_globals(&self, expr: &Expr, frame: usize, globals: &mut Set<String>) {
        match expr {
            Expr::Sym(sym) => {
                let id = sym.id();
                let original = self.level2.original_name(id);
                // Generated names only come from level-1 renamed locals.
                if original != id
                    || self.active().call_stack[frame].level1.is_local(id)
                    || original.starts_with(GUARD_EXEC)
                    || original.contains("__ESBMC_alloc")
                {
                    return;
                }
                if self.program.is_static(original) {
                    let _ = globals.insert(original.to_string());
                }
            }
            Expr::AddrOf(_) | Expr::Nondet(_) | Expr::Cst(_) => (),
            expr => {
                for sub in expr.subs() {
                    self.get_expr_globals(sub, frame, globals)
                }
            }
        }
    }

    fn analyze_read_at(&mut self, expr: &Expr, frame: usize) {
        let mut globals = Set::new();
        self.get_expr_globals(expr, frame, &mut globals);
        for id in globals {
            self.mpor.record_read(self.active_thread, id)
        }
    }
    fn analyze_assign_at(&mut self, lhs: &Expr, frame: usize) {
        let (written, read) = match lhs {
            Expr::Index { base, idx } => (base.as_ref(), Some(idx.as_ref())),
            Expr::Member { base, .. } => (base.as_ref(), None),
            lhs => (lhs, None),
        };
        let mut globals = Set::new();
        self.get_expr_globals(written, frame, &mut globals);
        for id in globals {
            self.mpor.record_write(self.active_thread, id)
        }
        if let Some(idx) = read {
            self.analyze_read_at(idx, frame)
        }
        if let Expr::Index { base, .. } | Expr::Member { base, .. } = written {
            self.analyze_assign_at(base, frame)
        }
    }

    /// Records the globals an expression reads.
    pub(crate) fn analyze_read(&mut self, expr: &Expr) {
        if self.threads.len() < 2 {
            return;
        }
        let frame = self.active().call_stack.len() - 1;
        self.analyze_read_at(expr, frame)
    }
    /// Records the globals an assignment writes.
    pub(crate) fn analyze_assign(&mut self, lhs: &Expr) {
        if self.threads.len() < 2 {
            return;
        }
        let frame = self.active().call_stack.len() - 1;
        self.analyze_assign_at(lhs, frame)
    }
    /// Records the globals written by an assignment to a level-1 renamed lhs, in the caller
    /// frame.
    fn analyze_assign_l1(&mut self, lhs: &Expr) {
        if self.threads.len() < 2 {
            return;
        }
        let depth = self.active().call_stack.len();
        if depth >= 2 {
            self.analyze_assign_at(lhs, depth - 2)
        }
    }
}

/// Threads and context switches.
impl ExecutionState {
    /// Adds a thread running some function, returns its index.
    ///
    /// The thread starts with the guard of the active thread, and uses the level-2 context of
    /// the state.
    pub fn add_thread(&mut self, function: &str) -> ThreadId {
        let tid = self.threads.len();
        let mut thread = ThreadState::new(tid, function);
        thread.guard = self.active().guard.clone();
        self.threads.push(thread);
        self.atomic_numbers.push(0);
        self.dfs_traversed.push(false);
        self.mpor.add_thread();
        tid
    }

    /// Switches the active thread.
    ///
    /// # Panics
    ///
    /// - if `tid` is the active thread, or not a thread index.
    pub fn switch_to_thread(&mut self, tid: ThreadId) {
        if tid == self.active_thread {
            panic!(
                "[fatal] switching to thread {}, which is already active",
                tid
            )
        }
        let _ = self.thread(tid);
        debug!(
            "context switch #{}: thread {} -> thread {}",
            self.cs_number + 1,
            self.active_thread,
            tid
        );
        self.last_active_thread = self.active_thread;
        self.active_thread = tid;
        self.cs_number += 1;
        self.requested_switch = None;
    }

    /// Commits a context-switch point: the next transition is taken by `next`, which may be
    /// the active thread.
    pub fn commit_transition(&mut self, next: ThreadId) -> Res<()> {
        if next == self.active_thread {
            self.last_active_thread = next;
        } else {
            self.switch_to_thread(next)
        }
        self.update_after_switch_point()
    }

    /// Guard execution at a context-switch commit point.
    ///
    /// Synthesizes a fresh guard symbol `g` for a new node, asserts `g => parent` where `parent`
    /// is the guard of the thread active before the switch, and propagates `g` to every thread.
    /// If `parent` is `false`, `false` is propagated instead.
    pub fn execute_guard(&mut self) -> Res<()> {
        self.node_id = self.node_counter.next();
        let parent = self.threads[self.last_active_thread].guard.as_expr();

        let new_guard = if parent.is_false() {
            Expr::from(false)
        } else {
            let cs_number = self.cs_number;
            let mut sym = Symbol::new(format!("{}@{}!0", GUARD_EXEC, cs_number), Typ::Bool);
            self.level2.register_original(sym.id(), GUARD_EXEC);
            self.level2.fresh(&mut sym, self.node_id);
            let guard = Expr::sym(sym);
            let source = self.source();
            let assumption = Expr::implies(guard.clone(), parent);
            self.sink
                .with(|target| target.assumption(&Expr::from(true), &assumption, &source))?;
            guard
        };
        debug!(
            "executing guard at node {}: {}",
            self.node_id, new_guard
        );

        for thread in self.threads.iter_mut() {
            thread.guard.replace(self.exec_guard.as_ref(), new_guard.clone())
        }
        self.exec_guard = Some(new_guard);

        if self.conf.smt_thread_guard && self.is_cur_state_guard_false()? {
            info!(
                "interleaving unviable at node {}, thread {}",
                self.node_id, self.active_thread
            );
            self.interleaving_unviable = true
        }
        Ok(())
    }

    /// True if the guard of the active thread was refuted.
    ///
    /// Without solver checks, only a trivially false guard is refuted. `Unknown` answers are
    /// treated as not refuted.
    pub fn is_cur_state_guard_false(&mut self) -> Res<bool> {
        let guard = self.active().guard.as_expr();
        if guard.is_false() {
            return Ok(true);
        }
        if !self.conf.smt_thread_guard {
            return Ok(false);
        }
        let question = Expr::eq(Expr::from(true), guard);
        let answer = self
            .sink
            .with(|target| target.ask_solver_question(&question))?;
        Ok(answer.is_false())
    }

    /// Updates the state after a context-switch point.
    pub fn update_after_switch_point(&mut self) -> Res<()> {
        self.execute_guard()?;
        self.reset_dfs_traversed();
        self.mpor.clear_accesses(self.active_thread);
        self.cswitch_forced = false;
        Ok(())
    }

    /// Forgets which threads were explored from the current context-switch point.
    pub fn reset_dfs_traversed(&mut self) {
        for traversed in self.dfs_traversed.iter_mut() {
            *traversed = false
        }
    }

    /// True if `tid` should be explored from the current context-switch point, marks it as
    /// explored.
    pub fn dfs_explore_thread(&mut self, tid: ThreadId) -> bool {
        if self.dfs_traversed[tid] || !self.thread(tid).can_continue() {
            return false;
        }
        self.dfs_traversed[tid] = true;
        true
    }

    /// True if the active thread can take a step.
    pub fn can_execution_continue(&self) -> bool {
        self.active().can_continue()
    }

    /// True if a context switch is possible at this point.
    pub fn has_cswitch_point_occured(&self) -> bool {
        self.cswitch_forced || self.mpor.has_accesses(self.active_thread)
    }

    /// True if interleavings cannot be explored from this point.
    pub fn check_if_ileaves_blocked(&self) -> bool {
        self.conf.cs_bound_reached(self.cs_number)
            || self.atomic_numbers[self.active_thread] > 0
            || self.conf.directed_interleavings
            || self.threads.len() < 2
    }

    /// True if the last transitions of `j` and `l` are dependent.
    pub fn check_mpor_dependancy(&self, j: ThreadId, l: ThreadId) -> bool {
        self.mpor.check_mpor_dependancy(j, l)
    }

    /// Updates the MPOR constraints after a transition of the active thread.
    ///
    /// Nothing to do while there is only one thread.
    pub fn calculate_mpor_constraints(&mut self) {
        if self.threads.len() < 2 {
            return;
        }
        self.mpor.calculate_mpor_constraints(self.active_thread)
    }

    /// True if `tid` is MPOR-schedulable.
    pub fn is_thread_mpor_schedulable(&self, tid: ThreadId) -> bool {
        self.mpor.is_schedulable(tid)
    }

    /// State digest.
    pub fn generate_hash(&self) -> hash::Digest {
        let program = &self.program;
        hash::generate_hash(
            &self.level2,
            self.threads
                .iter()
                .map(|thread| thread.location_number(program)),
        )
    }

    /// Writes the call stack of every thread.
    pub fn print_stack_traces(&self, w: &mut impl Write, indent: usize) -> Res<()> {
        let spaces = " ".repeat(indent);
        for (tid, thread) in self.threads.iter().enumerate() {
            let status = match self.status(tid) {
                Status::Running => "",
                Status::Atomic => " (atomic)",
                Status::Ended => " (ended)",
            };
            let active = if tid == self.active_thread { " *" } else { "" };
            writeln!(w, "{}Thread {}{}{}:", spaces, tid, status, active)?;
            let mut loc = Some(thread.pc.clone());
            for frame in thread.call_stack.iter().rev() {
                match &loc {
                    Some(loc) => writeln!(w, "{}  {} at {}", spaces, frame.function, loc)?,
                    None => writeln!(w, "{}  {}", spaces, frame.function)?,
                }
                loc = frame.calling_location.clone();
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ExecutionState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ExecutionState")
            .field("active_thread", &self.active_thread)
            .field("threads", &self.threads.len())
            .field("node_id", &self.node_id)
            .field("cs_number", &self.cs_number)
            .field("unviable", &self.interleaving_unviable)
            .field("sink", &self.sink)
            .finish()
    }
}
