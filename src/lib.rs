//! Concurrent symbolic-execution core of a bounded model checker.
//!
//! An [`ExecutionState`](state::ExecutionState) is one explored path of a multi-threaded
//! [`Program`](program::Program). It turns the instructions it steps into SSA form with a
//! two-level [renaming](rename) scheme, and sends guarded assignments, assumptions and claims to
//! a [`Target`](target::Target). At context-switch points, [MPOR](mpor) decides which threads are
//! worth scheduling and [state hashing](hash) detects states already explored.
//!
//! The [`Explorer`](explore::Explorer) is a reference depth-first driver.
//!
//! ```rust
//! use mt_symex::prelude::*;
//! use mt_symex::{explore::Explorer, program::{Kind, Program}, state::ExecutionState};
//! use mt_symex::target::Equation;
//!
//! let g = Symbol::new("g", Typ::Int);
//! let program = Program::new()
//!     .global(&g)
//!     .function("main", vec![], vec![
//!         Kind::Assign { lhs: Expr::sym(g.clone()), rhs: Expr::from(1) },
//!         Kind::Assert { cond: Expr::eq(Expr::sym(g.clone()), Expr::from(1)), msg: "g is 1".into() },
//!     ]);
//! let state = ExecutionState::new(
//!     Rc::new(program), Rc::new(Conf::new()), Box::new(Equation::new()),
//! ).unwrap();
//! let report = Explorer::new().explore(state).unwrap();
//! assert_eq!(report.interleavings, 1);
//! assert_eq!(report.claims.total, 1);
//! // Constant propagation discharges the claim.
//! assert_eq!(report.claims.remaining, 0);
//! ```

#![forbid(missing_docs)]

pub extern crate rsmt2;

#[macro_use]
mod macros;

pub mod prelude;

pub mod conf;
pub mod explore;
pub mod expr;
pub mod hash;
pub mod mpor;
pub mod program;
pub mod rename;
pub mod solver;
pub mod state;
mod symex;
pub mod target;
pub mod thread;
