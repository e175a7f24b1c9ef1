//! Defines the expression structure the symbolic executor works on.
//!
//! Expressions are immutable trees. They are shared by value: every path that needs to modify
//! an expression (renaming, constant substitution, simplification) works on its own clone.

crate::prelude!();

use rsmt2::print::{Expr2Smt, Sort2Smt, Sym2Smt};

#[cfg(test)]
mod test;

/// A type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Typ {
    /// Bool type.
    Bool,
    /// Integer type.
    Int,
    /// Rational type.
    Rat,
    /// Integer-indexed array type.
    Array(Box<Typ>),
    /// Pointer type.
    Pointer(Box<Typ>),
    /// Struct type, by tag.
    Struct(String),
    /// Union type, by tag.
    Union(String),
}
impl Typ {
    /// Creates an array type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use mt_symex::expr::Typ;
    /// let arr = Typ::array(Typ::Int);
    /// assert_eq!(&arr.to_string(), "[int]")
    /// ```
    pub fn array(elem: Typ) -> Self {
        Self::Array(Box::new(elem))
    }
    /// Creates a pointer type.
    pub fn pointer(target: Typ) -> Self {
        Self::Pointer(Box::new(target))
    }

    /// True if the type is an arithmetic one.
    pub fn is_arith(&self) -> bool {
        match self {
            Self::Int | Self::Rat => true,
            Self::Bool | Self::Array(_) | Self::Pointer(_) | Self::Struct(_) | Self::Union(_) => {
                false
            }
        }
    }

    /// Element type of an array type.
    pub fn elem(&self) -> Option<&Typ> {
        match self {
            Self::Array(elem) => Some(elem),
            _ => None,
        }
    }
}
impl Sort2Smt for Typ {
    fn sort_to_smt2<W: Write>(&self, w: &mut W) -> SmtRes<()> {
        match self {
            Self::Bool => write!(w, "Bool")?,
            Self::Int => write!(w, "Int")?,
            Self::Rat => write!(w, "Real")?,
            Self::Array(elem) => {
                write!(w, "(Array Int ")?;
                elem.sort_to_smt2(w)?;
                write!(w, ")")?
            }
            Self::Pointer(_) | Self::Struct(_) | Self::Union(_) => {
                bail!("type `{}` has no SMT-LIB encoding", self)
            }
        }
        Ok(())
    }
}

/// Constants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cst {
    /// Bool constant.
    B(bool),
    /// Integer constant.
    I(Int),
    /// Rational constant.
    R(Rat),
    /// String constant, only ever used behind an address-of.
    S(String),
}
impl HasTyp for Cst {
    fn typ(&self) -> Typ {
        match self {
            Self::B(_) => Typ::Bool,
            Self::I(_) => Typ::Int,
            Self::R(_) => Typ::Rat,
            Self::S(_) => Typ::array(Typ::Int),
        }
    }
}
impl Expr2Smt<()> for Cst {
    fn expr_to_smt2<W: Write>(&self, w: &mut W, _: ()) -> SmtRes<()> {
        match self {
            Self::B(b) => write!(w, "{}", b)?,
            Self::I(i) => {
                if i.sign() == Sign::Minus {
                    write!(w, "(- {})", -i)?
                } else {
                    write!(w, "{}", i)?
                }
            }
            Self::R(r) => {
                let (num, den) = (r.numer(), r.denom());
                if num.sign() == Sign::Minus {
                    write!(w, "(- (/ {} {}))", -num, den)?
                } else {
                    write!(w, "(/ {} {})", num, den)?
                }
            }
            Self::S(s) => bail!("string constant {:?} has no SMT-LIB encoding", s),
        }
        Ok(())
    }
}

/// Operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    /// If-then-else.
    Ite,
    /// Implication.
    Implies,
    /// Addition.
    Add,
    /// Subtraction, or negation when unary.
    Sub,
    /// Multiplication.
    Mul,
    /// Real division.
    Div,
    /// Integer division.
    IDiv,
    /// Modulo.
    Mod,
    /// Greater or equal.
    Ge,
    /// Less or equal.
    Le,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Equality.
    Eq,
    /// Negation.
    Not,
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}
impl Op {
    /// SMT-LIB name of the operator.
    pub fn smt_str(self) -> &'static str {
        match self {
            Self::Ite => "ite",
            Self::Implies => "=>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::IDiv => "div",
            Self::Mod => "mod",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "=",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// True if `self` is an arithmetic relation.
    pub fn is_arith_relation(self) -> bool {
        match self {
            Self::Ge | Self::Le | Self::Gt | Self::Lt => true,
            Self::Ite
            | Self::Implies
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::IDiv
            | Self::Mod
            | Self::Eq
            | Self::Not
            | Self::And
            | Self::Or => false,
        }
    }

    /// Minimal arity of `self`.
    pub fn min_arity(self) -> usize {
        match self {
            Self::Not | Self::Add | Self::Sub => 1,
            Self::And | Self::Or => 0,
            Self::Mod
            | Self::Mul
            | Self::Div
            | Self::IDiv
            | Self::Implies
            | Self::Eq
            | Self::Le
            | Self::Lt
            | Self::Ge
            | Self::Gt => 2,
            Self::Ite => 3,
        }
    }

    /// Maximal arity for `self`, `None` if infinite.
    pub fn max_arity(self) -> Option<usize> {
        match self {
            Self::Not => Some(1),
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::And
            | Self::Or
            | Self::Implies
            | Self::Eq
            | Self::Le
            | Self::Lt
            | Self::Ge
            | Self::Gt => None,
            Self::Mod | Self::Div | Self::IDiv => Some(2),
            Self::Ite => Some(3),
        }
    }

    /// Type-checks an operator application.
    pub fn type_check(self, args: &[Expr]) -> Res<Typ> {
        if args.len() < self.min_arity() {
            bail!(
                "`{}` expects at least {} argument(s)",
                self,
                self.min_arity(),
            )
        }
        if let Some(max) = self.max_arity() {
            if args.len() > max {
                bail!("`{}` expects at most {} argument(s)", self, max)
            }
        }

        let typ = match self {
            Self::Ite => {
                let typ = args[0].typ();
                if typ != Typ::Bool {
                    bail!("expected first argument of type `bool`, got `{}`", typ)
                }

                let thn_typ = args[1].typ();
                let els_typ = args[2].typ();

                if thn_typ != els_typ {
                    bail!(
                        "`{}`'s second and third arguments should have the same type, got `{}` and `{}`",
                        self, thn_typ, els_typ,
                    )
                }

                thn_typ
            }
            Self::Implies | Self::And | Self::Or | Self::Not => {
                if args.iter().any(|e| e.typ() != Typ::Bool) {
                    bail!("`{}`'s arguments must all be boolean expressions", self)
                }
                Typ::Bool
            }

            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::IDiv
            | Self::Mod
            | Self::Le
            | Self::Ge
            | Self::Lt
            | Self::Gt => {
                let mut typs = args.iter().map(Expr::typ);
                let first = typs.next().expect("at least one argument");
                if !first.is_arith() {
                    bail!(
                        "`{}`'s arguments must have an arithmetic type, unexpected type `{}`",
                        self,
                        first,
                    )
                }
                for typ in typs {
                    if typ != first {
                        bail!(
                            "`{}`'s arguments must all have the same type, found `{}` and `{}`",
                            self,
                            first,
                            typ,
                        )
                    }
                }
                if (self == Self::IDiv || self == Self::Mod) && first != Typ::Int {
                    bail!(
                        "`{}` can only be applied to integer arguments, found `{}`",
                        self,
                        first,
                    )
                }

                if self == Self::Div {
                    Typ::Rat
                } else if self.is_arith_relation() {
                    Typ::Bool
                } else {
                    first
                }
            }

            Self::Eq => {
                let mut typs = args.iter().map(Expr::typ);
                let first = typs.next().expect("at least two arguments");
                for typ in typs {
                    if typ != first {
                        bail!(
                            "`{}`'s arguments must all have the same type, found `{}` and `{}`",
                            self,
                            first,
                            typ,
                        )
                    }
                }
                Typ::Bool
            }
        };

        Ok(typ)
    }
}

/// Trait implemented by everything that has a type.
pub trait HasTyp: fmt::Display {
    /// Type accessor.
    fn typ(&self) -> Typ;
}

/// A symbol, *i.e.* a reference to some storage.
///
/// The identifier of a symbol is either an original name (level 0), a level-1 name
/// `id@version!thread` or a level-2 name `l1&node#count`, see [`rename`](crate::rename).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    /// Symbol identifier.
    id: String,
    /// Type of the symbol.
    typ: Typ,
}
impl Symbol {
    /// Constructor.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use mt_symex::expr::{Symbol, Typ};
    /// let sym = Symbol::new("g", Typ::Int);
    /// assert_eq!(sym.id(), "g");
    /// ```
    pub fn new<S: Into<String>>(id: S, typ: Typ) -> Self {
        Self { id: id.into(), typ }
    }

    /// Identifier accessor.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Changes the identifier of the symbol.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into()
    }

    /// Type accessor (borrow).
    pub fn typ_ref(&self) -> &Typ {
        &self.typ
    }
}
impl HasTyp for Symbol {
    fn typ(&self) -> Typ {
        self.typ.clone()
    }
}
impl Sym2Smt<()> for Symbol {
    fn sym_to_smt2<W: Write>(&self, w: &mut W, _: ()) -> SmtRes<()> {
        write_smt_ident(w, &self.id)
    }
}

/// Writes an identifier as a quoted SMT-LIB symbol.
///
/// Renamed identifiers contain `#`, which is not legal in simple symbols. Backslashes cannot
/// appear in quoted symbols, they are printed as `$`.
pub fn write_smt_ident<W: Write>(w: &mut W, id: &str) -> SmtRes<()> {
    write!(w, "|{}|", id.replace('\\', "$").replace('|', "$"))?;
    Ok(())
}

/// The expression structure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    /// A constant.
    Cst(Cst),
    /// A symbol reference.
    Sym(Symbol),
    /// An operator application.
    App {
        /// The operator.
        op: Op,
        /// The arguments.
        args: Vec<Expr>,
    },
    /// Address of some storage.
    AddrOf(Box<Expr>),
    /// Array indexing.
    Index {
        /// Array being indexed.
        base: Box<Expr>,
        /// Index.
        idx: Box<Expr>,
    },
    /// Struct or union member access.
    Member {
        /// Struct being accessed.
        base: Box<Expr>,
        /// Field name.
        field: String,
        /// Type of the field.
        typ: Typ,
    },
    /// Type cast.
    Cast {
        /// Target type.
        typ: Typ,
        /// Expression to cast.
        arg: Box<Expr>,
    },
    /// Array with all cells equal to `elem`.
    ArrayOf {
        /// Type of the array.
        typ: Typ,
        /// Value of every cell.
        elem: Box<Expr>,
    },
    /// Functional update of an array cell or struct member.
    With {
        /// Aggregate being updated.
        base: Box<Expr>,
        /// Index (arrays) or member name as a string constant (structs, unions).
        at: Box<Expr>,
        /// New value.
        val: Box<Expr>,
    },
    /// Struct constructor.
    Struct {
        /// Struct type.
        typ: Typ,
        /// Field values, in declaration order.
        fields: Vec<Expr>,
    },
    /// Union constructor.
    Union {
        /// Union type.
        typ: Typ,
        /// Field being initialized.
        field: String,
        /// Value.
        val: Box<Expr>,
    },
    /// A nondeterministic value, unique to this symbol.
    Nondet(Symbol),
}
impl Expr {
    /// Symbol constructor.
    pub fn sym(sym: Symbol) -> Self {
        Self::Sym(sym)
    }
    /// Address-of constructor.
    pub fn addr_of(e: Expr) -> Self {
        Self::AddrOf(Box::new(e))
    }
    /// Indexing constructor.
    pub fn index(base: Expr, idx: Expr) -> Self {
        Self::Index {
            base: Box::new(base),
            idx: Box::new(idx),
        }
    }
    /// Member access constructor.
    pub fn member(base: Expr, field: impl Into<String>, typ: Typ) -> Self {
        Self::Member {
            base: Box::new(base),
            field: field.into(),
            typ,
        }
    }
    /// Cast constructor.
    pub fn cast(typ: Typ, arg: Expr) -> Self {
        Self::Cast {
            typ,
            arg: Box::new(arg),
        }
    }
    /// Array-of constructor.
    pub fn array_of(typ: Typ, elem: Expr) -> Self {
        Self::ArrayOf {
            typ,
            elem: Box::new(elem),
        }
    }
    /// With-update constructor.
    pub fn with(base: Expr, at: Expr, val: Expr) -> Self {
        Self::With {
            base: Box::new(base),
            at: Box::new(at),
            val: Box::new(val),
        }
    }

    /// Negation, simplified.
    pub fn not(e: Expr) -> Self {
        Self::simplify_app(Op::Not, vec![e])
    }
    /// Conjunction, simplified.
    pub fn and(args: Vec<Expr>) -> Self {
        Self::simplify_app(Op::And, args)
    }
    /// Disjunction, simplified.
    pub fn or(args: Vec<Expr>) -> Self {
        Self::simplify_app(Op::Or, args)
    }
    /// Implication, simplified.
    pub fn implies(lhs: Expr, rhs: Expr) -> Self {
        Self::simplify_app(Op::Implies, vec![lhs, rhs])
    }
    /// Equality, simplified.
    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::simplify_app(Op::Eq, vec![lhs, rhs])
    }
    /// If-then-else, simplified.
    pub fn ite(cnd: Expr, thn: Expr, els: Expr) -> Self {
        Self::simplify_app(Op::Ite, vec![cnd, thn, els])
    }

    /// Simplifies the application of `op` to `args`, **non-recursively**.
    fn simplify_app(op: Op, mut args: Vec<Self>) -> Self {
        match op {
            Op::Not if args.len() == 1 => {
                if let Self::Cst(Cst::B(b)) = &args[0] {
                    return (!*b).into();
                }
                match args.pop().expect("one argument") {
                    Self::App {
                        op: Op::Not,
                        args: mut inner,
                    } if inner.len() == 1 => inner.pop().expect("one argument"),
                    arg => Self::App {
                        op,
                        args: vec![arg],
                    },
                }
            }
            Op::And | Op::Or => {
                // `neutral` disappears, `absorbing` wins.
                let (neutral, absorbing) = if op == Op::And {
                    (true, false)
                } else {
                    (false, true)
                };
                let mut flat = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Self::Cst(Cst::B(b)) if b == neutral => (),
                        Self::Cst(Cst::B(b)) if b == absorbing => return absorbing.into(),
                        Self::App { op: sub_op, args } if sub_op == op => flat.extend(args),
                        arg => {
                            if !flat.contains(&arg) {
                                flat.push(arg)
                            }
                        }
                    }
                }
                match flat.len() {
                    0 => neutral.into(),
                    1 => flat.pop().expect("one element"),
                    _ => Self::App { op, args: flat },
                }
            }
            Op::Implies if args.len() == 2 => {
                if args[0].is_false() || args[1].is_true() || args[0] == args[1] {
                    true.into()
                } else if args[0].is_true() {
                    args.pop().expect("two arguments")
                } else if args[1].is_false() {
                    Self::not(args.swap_remove(0))
                } else {
                    Self::App { op, args }
                }
            }
            Op::Eq if args.len() == 2 => {
                let both_csts = match (&args[0], &args[1]) {
                    (Self::Cst(Cst::S(_)), _) | (_, Self::Cst(Cst::S(_))) => false,
                    (Self::Cst(_), Self::Cst(_)) => true,
                    _ => false,
                };
                if both_csts || args[0] == args[1] {
                    (args[0] == args[1]).into()
                } else if args[0].is_true() {
                    args.pop().expect("two arguments")
                } else if args[1].is_true() {
                    args.swap_remove(0)
                } else {
                    Self::App { op, args }
                }
            }
            Op::Ite if args.len() == 3 => {
                if args[0].is_true() {
                    args.swap_remove(1)
                } else if args[0].is_false() || args[1] == args[2] {
                    args.pop().expect("three arguments")
                } else {
                    Self::App { op, args }
                }
            }
            Op::Sub if args.len() == 1 => {
                let neg = match &args[0] {
                    Self::Cst(Cst::I(i)) => Some(Cst::I(-i)),
                    Self::Cst(Cst::R(r)) => Some(Cst::R(-r)),
                    _ => None,
                };
                match neg {
                    Some(cst) => cst.into(),
                    None => Self::App { op, args },
                }
            }
            Op::Add | Op::Sub | Op::Mul if args.len() > 1 && args.iter().all(Self::is_int_cst) => {
                let mut ints = args.into_iter().map(|arg| match arg {
                    Self::Cst(Cst::I(i)) => i,
                    _ => unreachable!("checked above"),
                });
                let first = ints.next().expect("at least two arguments");
                let res = ints.fold(first, |acc, i| match op {
                    Op::Add => acc + i,
                    Op::Sub => acc - i,
                    _ => acc * i,
                });
                Cst::I(res).into()
            }
            _ => Self::App { op, args },
        }
    }

    /// Recursive simplification.
    pub fn simplify(self) -> Self {
        match self {
            Self::App { op, args } => {
                let args = args.into_iter().map(Self::simplify).collect();
                Self::simplify_app(op, args)
            }
            mut expr => {
                for sub in expr.subs_mut() {
                    let tmp = std::mem::replace(sub, Self::from(false));
                    *sub = tmp.simplify();
                }
                expr
            }
        }
    }

    fn is_int_cst(&self) -> bool {
        match self {
            Self::Cst(Cst::I(_)) => true,
            _ => false,
        }
    }
    /// True if `self` is the constant `false`.
    pub fn is_false(&self) -> bool {
        *self == Self::Cst(Cst::B(false))
    }
    /// True if `self` is the constant `true`.
    pub fn is_true(&self) -> bool {
        *self == Self::Cst(Cst::B(true))
    }
    /// Symbol accessor, `None` if `self` is not a symbol.
    pub fn as_sym(&self) -> Option<&Symbol> {
        match self {
            Self::Sym(sym) => Some(sym),
            _ => None,
        }
    }

    /// Direct sub-expressions.
    pub fn subs(&self) -> Vec<&Expr> {
        match self {
            Self::Cst(_) | Self::Sym(_) | Self::Nondet(_) => vec![],
            Self::App { args, .. } | Self::Struct { fields: args, .. } => args.iter().collect(),
            Self::AddrOf(e)
            | Self::Member { base: e, .. }
            | Self::Cast { arg: e, .. }
            | Self::ArrayOf { elem: e, .. }
            | Self::Union { val: e, .. } => vec![&**e],
            Self::Index { base, idx } => vec![&**base, &**idx],
            Self::With { base, at, val } => vec![&**base, &**at, &**val],
        }
    }
    /// Direct sub-expressions (mutable).
    pub fn subs_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Self::Cst(_) | Self::Sym(_) | Self::Nondet(_) => vec![],
            Self::App { args, .. } | Self::Struct { fields: args, .. } => {
                args.iter_mut().collect()
            }
            Self::AddrOf(e)
            | Self::Member { base: e, .. }
            | Self::Cast { arg: e, .. }
            | Self::ArrayOf { elem: e, .. }
            | Self::Union { val: e, .. } => vec![e.as_mut()],
            Self::Index { base, idx } => vec![base.as_mut(), idx.as_mut()],
            Self::With { base, at, val } => vec![base.as_mut(), at.as_mut(), val.as_mut()],
        }
    }
}
impl HasTyp for Expr {
    fn typ(&self) -> Typ {
        match self {
            Self::Sym(sym) | Self::Nondet(sym) => sym.typ(),
            Self::Cst(cst) => cst.typ(),
            Self::App { op, args } => match op.type_check(args) {
                Ok(typ) => typ,
                Err(e) => panic!("illegal operator application `{}`: {}", self, e),
            },
            Self::AddrOf(e) => Typ::pointer(e.typ()),
            Self::Index { base, .. } => match base.typ() {
                Typ::Array(elem) => *elem,
                typ => panic!("illegal indexing of `{}` of type `{}`", base, typ),
            },
            Self::Member { typ, .. }
            | Self::Cast { typ, .. }
            | Self::ArrayOf { typ, .. }
            | Self::Struct { typ, .. }
            | Self::Union { typ, .. } => typ.clone(),
            Self::With { base, .. } => base.typ(),
        }
    }
}
impl Expr2Smt<()> for Expr {
    fn expr_to_smt2<W: Write>(&self, w: &mut W, i: ()) -> SmtRes<()> {
        match self {
            Self::Cst(cst) => cst.expr_to_smt2(w, i),
            Self::Sym(sym) | Self::Nondet(sym) => sym.sym_to_smt2(w, i),
            Self::App { op, args } => {
                // Empty conjunctions and disjunctions are not legal SMT-LIB.
                match (op, args.len()) {
                    (Op::And, 0) => return Cst::B(true).expr_to_smt2(w, i),
                    (Op::Or, 0) => return Cst::B(false).expr_to_smt2(w, i),
                    (Op::And, 1) | (Op::Or, 1) => return args[0].expr_to_smt2(w, i),
                    _ => (),
                }
                write!(w, "({}", op.smt_str())?;
                for arg in args {
                    write!(w, " ")?;
                    arg.expr_to_smt2(w, i)?
                }
                write!(w, ")")?;
                Ok(())
            }
            Self::Index { base, idx } => {
                write!(w, "(select ")?;
                base.expr_to_smt2(w, i)?;
                write!(w, " ")?;
                idx.expr_to_smt2(w, i)?;
                write!(w, ")")?;
                Ok(())
            }
            Self::With { base, at, val } if base.typ().elem().is_some() => {
                write!(w, "(store ")?;
                base.expr_to_smt2(w, i)?;
                write!(w, " ")?;
                at.expr_to_smt2(w, i)?;
                write!(w, " ")?;
                val.expr_to_smt2(w, i)?;
                write!(w, ")")?;
                Ok(())
            }
            Self::ArrayOf { typ, elem } => {
                write!(w, "((as const ")?;
                typ.sort_to_smt2(w)?;
                write!(w, ") ")?;
                elem.expr_to_smt2(w, i)?;
                write!(w, ")")?;
                Ok(())
            }
            Self::Cast { typ: Typ::Rat, arg } if arg.typ() == Typ::Int => {
                write!(w, "(to_real ")?;
                arg.expr_to_smt2(w, i)?;
                write!(w, ")")?;
                Ok(())
            }
            Self::Cast { typ: Typ::Int, arg } if arg.typ() == Typ::Rat => {
                write!(w, "(to_int ")?;
                arg.expr_to_smt2(w, i)?;
                write!(w, ")")?;
                Ok(())
            }
            Self::Cast { typ, arg } if *typ == arg.typ() => arg.expr_to_smt2(w, i),
            expr => bail!("expression `{}` has no SMT-LIB encoding", expr),
        }
    }
}

/// Packs basic trait implementations.
mod trait_impls {
    use super::*;

    impl fmt::Display for Typ {
        fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            match self {
                Self::Bool => write!(fmt, "bool"),
                Self::Int => write!(fmt, "int"),
                Self::Rat => write!(fmt, "rat"),
                Self::Array(elem) => write!(fmt, "[{}]", elem),
                Self::Pointer(target) => write!(fmt, "*{}", target),
                Self::Struct(tag) => write!(fmt, "struct {}", tag),
                Self::Union(tag) => write!(fmt, "union {}", tag),
            }
        }
    }

    impl fmt::Display for Op {
        fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            match self {
                Self::Mod => write!(fmt, "%"),
                op => op.smt_str().fmt(fmt),
            }
        }
    }

    impl fmt::Display for Cst {
        fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            match self {
                Self::B(b) => b.fmt(fmt),
                Self::I(i) => {
                    if i.sign() == Sign::Minus {
                        write!(fmt, "(- {})", -i)
                    } else {
                        i.fmt(fmt)
                    }
                }
                Self::R(r) => {
                    let (num, den) = (r.numer(), r.denom());
                    match (num.sign(), den.sign()) {
                        (Sign::Minus, Sign::Minus) => write!(fmt, "(/ {} {})", -num, -den),
                        (Sign::Minus, _) => write!(fmt, "(- (/ {} {}))", -num, den),
                        (_, Sign::Minus) => write!(fmt, "(- (/ {} {}))", num, -den),
                        _ => write!(fmt, "(/ {} {})", num, den),
                    }
                }
                Self::S(s) => write!(fmt, "{:?}", s),
            }
        }
    }
    impl From<bool> for Cst {
        fn from(b: bool) -> Self {
            Self::B(b)
        }
    }
    impl From<Int> for Cst {
        fn from(i: Int) -> Self {
            Self::I(i)
        }
    }
    impl From<i32> for Cst {
        fn from(n: i32) -> Self {
            Self::I(n.into())
        }
    }
    impl From<i64> for Cst {
        fn from(n: i64) -> Self {
            Self::I(n.into())
        }
    }
    impl From<usize> for Cst {
        fn from(n: usize) -> Self {
            Self::I(n.into())
        }
    }
    impl From<(usize, usize)> for Cst {
        fn from((num, den): (usize, usize)) -> Self {
            let (num, den): (Int, Int) = (num.into(), den.into());
            Rat::new(num, den).into()
        }
    }
    impl From<Rat> for Cst {
        fn from(r: Rat) -> Self {
            Self::R(r)
        }
    }
    impl From<&str> for Cst {
        fn from(s: &str) -> Self {
            Self::S(s.into())
        }
    }

    impl fmt::Display for Symbol {
        fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            write!(fmt, "{}", self.id)
        }
    }

    impl fmt::Display for Expr {
        fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
            match self {
                Self::Cst(cst) => cst.fmt(fmt),
                Self::Sym(sym) => sym.fmt(fmt),
                Self::Nondet(sym) => write!(fmt, "(nondet {})", sym),
                Self::App { op, args } => {
                    write!(fmt, "({}", op)?;
                    for arg in args {
                        write!(fmt, " {}", arg)?
                    }
                    write!(fmt, ")")
                }
                Self::AddrOf(e) => write!(fmt, "(& {})", e),
                Self::Index { base, idx } => write!(fmt, "{}[{}]", base, idx),
                Self::Member { base, field, .. } => write!(fmt, "{}.{}", base, field),
                Self::Cast { typ, arg } => write!(fmt, "(({}) {})", typ, arg),
                Self::ArrayOf { elem, .. } => write!(fmt, "(array_of {})", elem),
                Self::With { base, at, val } => write!(fmt, "({} with {} := {})", base, at, val),
                Self::Struct { typ, fields } => {
                    write!(fmt, "({}", typ)?;
                    for field in fields {
                        write!(fmt, " {}", field)?
                    }
                    write!(fmt, ")")
                }
                Self::Union { typ, field, val } => write!(fmt, "({} {} := {})", typ, field, val),
            }
        }
    }
    impl<C> From<C> for Expr
    where
        C: Into<Cst>,
    {
        fn from(cst: C) -> Self {
            Self::Cst(cst.into())
        }
    }
    impl From<(Op, Vec<Expr>)> for Expr {
        fn from((op, args): (Op, Vec<Expr>)) -> Self {
            Self::App { op, args }
        }
    }
    impl From<Symbol> for Expr {
        fn from(sym: Symbol) -> Self {
            Self::Sym(sym)
        }
    }
}
