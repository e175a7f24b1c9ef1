//! Common imports throughout this project.

pub use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap as Map, BTreeSet as Set},
    fmt,
    io::Write,
    ops::{Deref, DerefMut},
    rc::Rc,
};

pub use either::Either;
pub use error_chain::bail;
pub use log::{debug, info, trace, warn};
pub use num::{bigint::Sign, BigInt as Int, BigRational as Rat, Zero};
pub use rsmt2::SmtRes;

pub use crate::{conf, explore, expr, hash, mpor, program, rename, solver, state, target, thread};

pub use crate::{
    conf::Conf,
    expr::{Cst, Expr, HasTyp, Op, Symbol, Typ},
    program::{Loc, Source},
};

/// Thread index, zero-based, in spawn order.
pub type ThreadId = usize;

/// Identifier of a context-switch node.
///
/// Node ids are handed out by a [`NodeCounter`](state::NodeCounter) shared by all the states
/// derived from the same root state.
pub type NodeId = usize;

error_chain::error_chain! {
    types {
        Error, ErrorKind, ResExt, Res;
    }

    links {
        Smt2(rsmt2::errors::Error, rsmt2::errors::ErrorKind)
        /// An error from the `rsmt2` crate.
        ;
    }

    foreign_links {
        Io(std::io::Error)
        /// I/O error.
        ;
    }

    errors {
        /// The program has no entry point with this name.
        NoEntryPoint(name: String) {
            description("entry point not found")
            display("{} symbol not found; please set an entry point", name)
        }
        /// A call to a function that does not exist.
        UnknownFunction(name: String) {
            description("unknown function")
            display("call to unknown function `{}`", name)
        }
        /// An expression the state hasher does not know how to serialise.
        Unserialisable(desc: String) {
            description("unrecognized expression when generating state hash")
            display("unrecognized expression when generating state hash: {}", desc)
        }
    }
}
