//! Instruction-stream program representation.
//!
//! A [`Program`] is a map from function names to [`Function`]s, plus the set of identifiers with
//! static lifetime (globals). Every instruction carries a location number unique in the whole
//! program, assigned in insertion order by [`Program::function`].
//!
//! A function body always ends with [`Kind::EndFunction`], the constructor adds it if needed.

crate::prelude!();

/// Instruction kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// Assignment.
    Assign {
        /// Left-hand side, a symbol or an index into a symbol.
        lhs: Expr,
        /// Right-hand side.
        rhs: Expr,
    },
    /// Declaration of a local.
    Decl(Symbol),
    /// Conditional jump to the instruction at index `target` in the same function.
    Goto {
        /// Jump condition.
        cond: Expr,
        /// Target index.
        target: usize,
    },
    /// Assumption.
    Assume(Expr),
    /// Assertion.
    Assert {
        /// Condition to check.
        cond: Expr,
        /// Message reported on violation.
        msg: String,
    },
    /// Function call.
    Call {
        /// Where the returned value goes, if anywhere.
        lhs: Option<Expr>,
        /// Callee.
        function: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Return, with an optional returned value.
    Return(Option<Expr>),
    /// End of the current function.
    EndFunction,
    /// Start of an atomic section.
    AtomicBegin,
    /// End of an atomic section.
    AtomicEnd,
    /// Spawns a thread running some function.
    StartThread(String),
    /// Explicit interleaving point.
    Yield,
    /// Requests a switch to some thread, for user-directed interleavings.
    SwitchTo(ThreadId),
    /// No-op.
    Skip,
}
impl Kind {
    /// True for the instructions that are executed even under a false guard.
    pub fn is_control_flow(&self) -> bool {
        match self {
            Self::Goto { .. } | Self::EndFunction | Self::Return(_) => true,
            Self::AtomicBegin | Self::AtomicEnd => true,
            Self::Assign { .. }
            | Self::Decl(_)
            | Self::Assume(_)
            | Self::Assert { .. }
            | Self::Call { .. }
            | Self::StartThread(_)
            | Self::Yield
            | Self::SwitchTo(_)
            | Self::Skip => false,
        }
    }
}

/// An instruction.
#[readonly::make]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Instruction kind.
    pub kind: Kind,
    /// Location number, unique program-wide.
    pub location: usize,
}

/// A function.
#[readonly::make]
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Formal parameters.
    pub params: Vec<Symbol>,
    /// Body, ends with [`Kind::EndFunction`].
    pub body: Vec<Instruction>,
}
impl Function {
    /// Index of the last instruction.
    pub fn end_index(&self) -> usize {
        self.body.len() - 1
    }
}

/// A program location: a function and an instruction index in its body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Loc {
    /// Function.
    pub function: String,
    /// Index in the body.
    pub index: usize,
}
impl Loc {
    /// Constructor.
    pub fn new(function: impl Into<String>, index: usize) -> Self {
        Self {
            function: function.into(),
            index,
        }
    }
    /// Location right after this one.
    pub fn next(&self) -> Self {
        Self::new(self.function.clone(), self.index + 1)
    }
}
impl fmt::Display for Loc {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}:{}", self.function, self.index)
    }
}

/// Provenance of a fact sent to a sink.
#[readonly::make]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Function the fact comes from.
    pub function: String,
    /// Location number of the instruction.
    pub location: usize,
    /// Thread executing the instruction.
    pub thread: ThreadId,
}
impl Source {
    /// Constructor.
    pub fn new(function: impl Into<String>, location: usize, thread: ThreadId) -> Self {
        Self {
            function: function.into(),
            location,
            thread,
        }
    }
}
impl fmt::Display for Source {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{} (location {}, thread {})",
            self.function, self.location, self.thread
        )
    }
}

/// A program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Functions by name.
    functions: Map<String, Function>,
    /// Identifiers with static lifetime.
    statics: Map<String, Typ>,
    /// Next location number.
    next_location: usize,
}
impl Program {
    /// Empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a global.
    pub fn global(mut self, sym: &Symbol) -> Self {
        self.statics.insert(sym.id().into(), sym.typ());
        self
    }

    /// Adds a function, numbers its instructions.
    pub fn function(
        mut self,
        name: impl Into<String>,
        params: Vec<Symbol>,
        body: impl IntoIterator<Item = Kind>,
    ) -> Self {
        let name = name.into();
        let mut body: Vec<Instruction> = body
            .into_iter()
            .map(|kind| {
                let location = self.next_location;
                self.next_location += 1;
                Instruction { kind, location }
            })
            .collect();
        if body.last().map(|i| &i.kind) != Some(&Kind::EndFunction) {
            body.push(Instruction {
                kind: Kind::EndFunction,
                location: self.next_location,
            });
            self.next_location += 1;
        }
        let function = Function {
            name: name.clone(),
            params,
            body,
        };
        let _prev = self.functions.insert(name, function);
        self
    }

    /// Checks that every jump lands inside its function.
    pub fn check(&self) -> Res<()> {
        for function in self.functions.values() {
            let len = function.body.len();
            for (index, instr) in function.body.iter().enumerate() {
                if let Kind::Goto { target, .. } = &instr.kind {
                    if *target >= len {
                        bail!(
                            "goto at `{}`:{} targets {}, but `{}` has {} instruction(s)",
                            function.name,
                            index,
                            target,
                            function.name,
                            len
                        )
                    }
                }
            }
        }
        Ok(())
    }

    /// Entry point lookup.
    pub fn entry(&self, name: &str) -> Res<&Function> {
        self.functions
            .get(name)
            .ok_or_else(|| ErrorKind::NoEntryPoint(name.into()).into())
    }

    /// Function lookup.
    pub fn get_function(&self, name: &str) -> Res<&Function> {
        self.functions
            .get(name)
            .ok_or_else(|| ErrorKind::UnknownFunction(name.into()).into())
    }

    /// Instruction at some location, `None` if out of bounds.
    pub fn instruction(&self, loc: &Loc) -> Option<&Instruction> {
        self.functions
            .get(&loc.function)
            .and_then(|f| f.body.get(loc.index))
    }

    /// True if an identifier has static lifetime.
    pub fn is_static(&self, id: &str) -> bool {
        self.statics.contains_key(id)
    }

    /// Globals and their types.
    pub fn statics(&self) -> impl Iterator<Item = (&String, &Typ)> {
        self.statics.iter()
    }
}
