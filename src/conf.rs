//! Run configuration.
//!
//! A [`Conf`] is built once per run and is read-only afterwards: states only ever hold an
//! `Rc<Conf>`. Setters are chainable, in the style of [`rsmt2::SmtConf`].

crate::prelude!();

/// Sink discipline for state clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every clone owns an independent copy of the sink.
    Owned,
    /// The sink is shared, clones push a solver context and pop it when dropped.
    Incremental,
    /// The sink is shared without push/pop, claim counters are aggregated across the run.
    Schedule,
}
impl fmt::Display for Strategy {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Owned => write!(fmt, "owned"),
            Self::Incremental => write!(fmt, "incremental"),
            Self::Schedule => write!(fmt, "schedule"),
        }
    }
}

/// Default unwinding bound for backward gotos.
pub const DEFAULT_UNWIND: usize = 8;
/// Default maximal with-update nesting for constant propagation.
pub const DEFAULT_WITH_DEPTH: usize = 6;

/// Run configuration.
#[readonly::make]
#[derive(Debug, Clone)]
pub struct Conf {
    /// Context-switch bound, `-1` for unbounded.
    pub context_switch_bound: i64,
    /// User-directed interleavings, the explorer never switches on its own.
    pub directed_interleavings: bool,
    /// Ask the solver whether the guard is satisfiable after each context switch.
    pub smt_thread_guard: bool,
    /// Solve during symbolic execution, uses push/pop on a shared sink.
    pub smt_during_symex: bool,
    /// Schedule mode, shared sink and aggregated claims.
    pub schedule: bool,
    /// State hashing.
    pub state_hashing: bool,
    /// Location number to log a marker at.
    pub break_at: Option<usize>,
    /// Logs every stepped instruction.
    pub symex_trace: bool,
    /// Unwinding bound for backward gotos.
    pub unwind: usize,
    /// Maximal with-update nesting for constant propagation.
    pub max_with_depth: usize,
    /// Name of the entry function.
    pub entry_point: String,
}
impl Default for Conf {
    fn default() -> Self {
        Self {
            context_switch_bound: -1,
            directed_interleavings: false,
            smt_thread_guard: false,
            smt_during_symex: false,
            schedule: false,
            state_hashing: false,
            break_at: None,
            symex_trace: false,
            unwind: DEFAULT_UNWIND,
            max_with_depth: DEFAULT_WITH_DEPTH,
            entry_point: "main".into(),
        }
    }
}
impl Conf {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the context-switch bound, negative for unbounded.
    pub fn context_switch_bound(mut self, bound: i64) -> Self {
        self.context_switch_bound = bound;
        self
    }
    /// (De)activates user-directed interleavings.
    pub fn directed_interleavings(mut self, on: bool) -> Self {
        self.directed_interleavings = on;
        self
    }
    /// (De)activates solver checks of the thread guard.
    pub fn smt_thread_guard(mut self, on: bool) -> Self {
        self.smt_thread_guard = on;
        self
    }
    /// (De)activates solving during symbolic execution.
    pub fn smt_during_symex(mut self, on: bool) -> Self {
        self.smt_during_symex = on;
        self
    }
    /// (De)activates schedule mode.
    pub fn schedule(mut self, on: bool) -> Self {
        self.schedule = on;
        self
    }
    /// (De)activates state hashing.
    pub fn state_hashing(mut self, on: bool) -> Self {
        self.state_hashing = on;
        self
    }
    /// Sets the breakpoint location.
    pub fn break_at(mut self, loc: impl Into<Option<usize>>) -> Self {
        self.break_at = loc.into();
        self
    }
    /// (De)activates instruction tracing.
    pub fn symex_trace(mut self, on: bool) -> Self {
        self.symex_trace = on;
        self
    }
    /// Sets the unwinding bound.
    pub fn unwind(mut self, bound: usize) -> Self {
        self.unwind = bound;
        self
    }
    /// Sets the maximal with-update nesting for constant propagation.
    pub fn max_with_depth(mut self, depth: usize) -> Self {
        self.max_with_depth = depth;
        self
    }
    /// Sets the entry point.
    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    /// Sink strategy.
    ///
    /// Schedule mode wins over solving during symbolic execution.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use mt_symex::conf::{Conf, Strategy};
    /// assert_eq!(Conf::new().strategy(), Strategy::Owned);
    /// assert_eq!(Conf::new().smt_during_symex(true).strategy(), Strategy::Incremental);
    /// assert_eq!(
    ///     Conf::new().smt_during_symex(true).schedule(true).strategy(),
    ///     Strategy::Schedule,
    /// );
    /// ```
    pub fn strategy(&self) -> Strategy {
        if self.schedule {
            Strategy::Schedule
        } else if self.smt_during_symex {
            Strategy::Incremental
        } else {
            Strategy::Owned
        }
    }

    /// True if the context-switch bound is `cs_number`.
    pub fn cs_bound_reached(&self, cs_number: usize) -> bool {
        self.context_switch_bound >= 0 && cs_number as i64 >= self.context_switch_bound
    }
}
