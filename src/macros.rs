//! Crate macros.

/// Imports the crate's prelude.
#[macro_export]
macro_rules! prelude {
    {} => { use $crate::prelude::*; };
    { pub } => { pub use $crate::prelude::*; };
}

/// Convenience macro, provides a DSL for writing expressions.
///
/// - symbols must be written as `(sym_name: sym_typ)`, without any quotes;
/// - `(& e)` is address-of, `(at a i)` is array indexing.
#[macro_export]
macro_rules! build_expr {
    (true) => ( $crate::expr::Expr::from(true) );
    (false) => ( $crate::expr::Expr::from(false) );

    ( ($sym:ident : $typ:ident) ) => (
        $crate::expr::Expr::sym(
            $crate::expr::Symbol::new(stringify!($sym), $crate::build_typ!($typ))
        )
    );

    ( (& $arg:tt) ) => (
        $crate::expr::Expr::addr_of($crate::build_expr!($arg))
    );
    ( (at $base:tt $idx:tt) ) => (
        $crate::expr::Expr::index($crate::build_expr!($base), $crate::build_expr!($idx))
    );

    ( ($op:tt $($args:tt)*) ) => (
        $crate::expr::Expr::from((
            $crate::build_expr!(@op $op),
            vec![ $($crate::build_expr!($args)),* ],
        ))
    );

    ($cst:expr) => ( $crate::expr::Expr::from($cst) );

    (@op ite) => ( $crate::expr::Op::Ite );
    (@op =>) => ( $crate::expr::Op::Implies );
    (@op +) => ( $crate::expr::Op::Add );
    (@op -) => ( $crate::expr::Op::Sub );
    (@op *) => ( $crate::expr::Op::Mul );
    (@op /) => ( $crate::expr::Op::Div );
    (@op %) => ( $crate::expr::Op::Mod );
    (@op >=) => ( $crate::expr::Op::Ge );
    (@op <=) => ( $crate::expr::Op::Le );
    (@op >) => ( $crate::expr::Op::Gt );
    (@op <) => ( $crate::expr::Op::Lt );
    (@op =) => ( $crate::expr::Op::Eq );
    (@op not) => ( $crate::expr::Op::Not );
    (@op and) => ( $crate::expr::Op::And );
    (@op or) => ( $crate::expr::Op::Or );
    (@op !) => ( $crate::expr::Op::Not );
    (@op &&) => ( $crate::expr::Op::And );
    (@op ||) => ( $crate::expr::Op::Or );
}

/// Builds a type.
#[macro_export]
macro_rules! build_typ {
    (bool) => {
        $crate::expr::Typ::Bool
    };
    (int) => {
        $crate::expr::Typ::Int
    };
    (rat) => {
        $crate::expr::Typ::Rat
    };
}
