//! Decision-procedure sinks.
//!
//! A [`Target`] receives the SSA steps produced by symbolic execution: guarded assignments,
//! assumptions and assertions. It can also be asked questions about boolean expressions, which
//! is how unviable interleavings are detected early.
//!
//! [`Equation`] is the in-memory batch target, the SMT-backed one lives in
//! [`solver`](crate::solver).

crate::prelude!();

use conf::Strategy;

#[cfg(test)]
mod test;

/// A three-valued answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tv {
    /// Always true.
    True,
    /// Never true.
    False,
    /// Could not decide.
    Unknown,
}
impl Tv {
    /// True if `self` is `False`.
    pub fn is_false(self) -> bool {
        self == Self::False
    }
}
impl fmt::Display for Tv {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::True => write!(fmt, "true"),
            Self::False => write!(fmt, "false"),
            Self::Unknown => write!(fmt, "unknown"),
        }
    }
}

/// A step sent to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Guarded assignment `guard => lhs = rhs`.
    Assignment {
        /// Guard.
        guard: Expr,
        /// Level-2 symbol assigned.
        lhs: Symbol,
        /// Level-2 renamed value.
        rhs: Expr,
        /// Provenance.
        source: Source,
    },
    /// Guarded assumption `guard => fact`.
    Assumption {
        /// Guard.
        guard: Expr,
        /// Assumed fact.
        fact: Expr,
        /// Provenance.
        source: Source,
    },
    /// Guarded assertion `guard => cond`.
    Assertion {
        /// Guard.
        guard: Expr,
        /// Asserted condition.
        cond: Expr,
        /// Message shown on violation.
        msg: String,
        /// Provenance.
        source: Source,
    },
}
impl Step {
    /// The boolean fact this step stands for.
    ///
    /// Assertions yield the *claim* `guard => cond`, which targets check rather than assume.
    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Assignment {
                guard, lhs, rhs, ..
            } => Expr::implies(guard.clone(), Expr::eq(Expr::sym(lhs.clone()), rhs.clone())),
            Self::Assumption { guard, fact, .. } => Expr::implies(guard.clone(), fact.clone()),
            Self::Assertion { guard, cond, .. } => Expr::implies(guard.clone(), cond.clone()),
        }
    }

    /// True for assertions.
    pub fn is_assertion(&self) -> bool {
        match self {
            Self::Assertion { .. } => true,
            Self::Assignment { .. } | Self::Assumption { .. } => false,
        }
    }
}
impl fmt::Display for Step {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Assignment {
                guard, lhs, rhs, ..
            } => write!(fmt, "{} => {} := {}", guard, lhs, rhs),
            Self::Assumption { guard, fact, .. } => write!(fmt, "{} => assume {}", guard, fact),
            Self::Assertion {
                guard, cond, msg, ..
            } => write!(fmt, "{} => assert {} // {}", guard, cond, msg),
        }
    }
}

/// A decision-procedure sink.
pub trait Target {
    /// Records a guarded assignment.
    fn assignment(&mut self, guard: &Expr, lhs: &Symbol, rhs: &Expr, source: &Source)
        -> Res<()>;
    /// Records a guarded assumption.
    fn assumption(&mut self, guard: &Expr, fact: &Expr, source: &Source) -> Res<()>;
    /// Records a guarded proof obligation.
    fn assertion(&mut self, guard: &Expr, cond: &Expr, msg: &str, source: &Source) -> Res<()>;
    /// Asks whether a boolean expression is always, never, or sometimes true under the facts
    /// recorded so far.
    fn ask_solver_question(&mut self, question: &Expr) -> Res<Tv>;
    /// Opens a context, everything recorded until the matching [`Target::pop_ctx`] is dropped
    /// by it.
    fn push_ctx(&mut self) -> Res<()>;
    /// Closes a context.
    fn pop_ctx(&mut self) -> Res<()>;
    /// Independent copy of the target.
    fn box_clone(&self) -> Res<Box<dyn Target>>;
    /// Steps recorded so far, oldest first.
    fn steps(&self) -> &[Step];
}

/// In-memory batch target.
///
/// Questions are answered by simplification only: the answer is `Unknown` unless the question
/// simplifies to a constant.
#[derive(Debug, Clone, Default)]
pub struct Equation {
    /// Steps.
    steps: Vec<Step>,
    /// Number of steps at each open context.
    ctx: Vec<usize>,
}
impl Equation {
    /// Empty equation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open contexts.
    pub fn depth(&self) -> usize {
        self.ctx.len()
    }

    /// Records a step.
    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step)
    }
}
impl Target for Equation {
    fn assignment(
        &mut self,
        guard: &Expr,
        lhs: &Symbol,
        rhs: &Expr,
        source: &Source,
    ) -> Res<()> {
        self.push_step(Step::Assignment {
            guard: guard.clone(),
            lhs: lhs.clone(),
            rhs: rhs.clone(),
            source: source.clone(),
        });
        Ok(())
    }
    fn assumption(&mut self, guard: &Expr, fact: &Expr, source: &Source) -> Res<()> {
        self.push_step(Step::Assumption {
            guard: guard.clone(),
            fact: fact.clone(),
            source: source.clone(),
        });
        Ok(())
    }
    fn assertion(&mut self, guard: &Expr, cond: &Expr, msg: &str, source: &Source) -> Res<()> {
        self.push_step(Step::Assertion {
            guard: guard.clone(),
            cond: cond.clone(),
            msg: msg.into(),
            source: source.clone(),
        });
        Ok(())
    }
    fn ask_solver_question(&mut self, question: &Expr) -> Res<Tv> {
        let simplified = question.clone().simplify();
        let res = if simplified.is_true() {
            Tv::True
        } else if simplified.is_false() {
            Tv::False
        } else {
            Tv::Unknown
        };
        Ok(res)
    }
    fn push_ctx(&mut self) -> Res<()> {
        self.ctx.push(self.steps.len());
        Ok(())
    }
    fn pop_ctx(&mut self) -> Res<()> {
        match self.ctx.pop() {
            Some(len) => {
                self.steps.truncate(len);
                Ok(())
            }
            None => bail!("cannot pop context: no context is open"),
        }
    }
    fn box_clone(&self) -> Res<Box<dyn Target>> {
        Ok(Box::new(self.clone()))
    }
    fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Handle on the target of an execution state.
pub enum Sink {
    /// Target owned by a single state.
    Owned(Box<dyn Target>),
    /// Target shared by all the states of a run.
    Shared {
        /// The target.
        target: Rc<RefCell<Box<dyn Target>>>,
        /// Pop a context when this handle is dropped.
        pop_on_drop: bool,
    },
}
impl Sink {
    /// Root sink for some strategy.
    pub fn new(target: Box<dyn Target>, strategy: Strategy) -> Self {
        match strategy {
            Strategy::Owned => Self::Owned(target),
            Strategy::Incremental | Strategy::Schedule => Self::Shared {
                target: Rc::new(RefCell::new(target)),
                pop_on_drop: false,
            },
        }
    }

    /// Sink for a clone of the owning state.
    pub fn fork(&self, strategy: Strategy) -> Res<Self> {
        match (self, strategy) {
            (Self::Owned(target), _) => Ok(Self::Owned(target.box_clone()?)),
            (Self::Shared { target, .. }, Strategy::Incremental) => {
                target.borrow_mut().push_ctx()?;
                Ok(Self::Shared {
                    target: target.clone(),
                    pop_on_drop: true,
                })
            }
            (Self::Shared { target, .. }, _) => Ok(Self::Shared {
                target: target.clone(),
                pop_on_drop: false,
            }),
        }
    }

    /// Applies something to the underlying target.
    pub fn with<T>(&mut self, f: impl FnOnce(&mut dyn Target) -> Res<T>) -> Res<T> {
        match self {
            Self::Owned(target) => f(target.as_mut()),
            Self::Shared { target, .. } => f(target.borrow_mut().as_mut()),
        }
    }

    /// Copy of the steps recorded by the underlying target.
    pub fn steps(&self) -> Vec<Step> {
        match self {
            Self::Owned(target) => target.steps().to_vec(),
            Self::Shared { target, .. } => target.borrow().steps().to_vec(),
        }
    }
}
impl Drop for Sink {
    fn drop(&mut self) {
        if let Self::Shared {
            target,
            pop_on_drop: true,
        } = self
        {
            if let Err(e) = target.borrow_mut().pop_ctx() {
                warn!("error while popping solver context: {}", e)
            }
        }
    }
}
impl fmt::Debug for Sink {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Owned(_) => write!(fmt, "Sink::Owned"),
            Self::Shared { pop_on_drop, .. } => {
                write!(fmt, "Sink::Shared {{ pop_on_drop: {} }}", pop_on_drop)
            }
        }
    }
}
