//! State hashing.
//!
//! Every assignment performed under the [`StateHashing`](rename::Flavor::StateHashing) level-2
//! flavor records the digest of its serialised right-hand side, keyed by the original
//! identifier of the variable assigned. A state digest folds these value digests with the
//! position of every thread.
//!
//! Equal digests are understood as equivalent states. This is a hash, collisions are possible:
//! the thread count and the thread positions are part of the digest and act as cheap
//! disambiguators.

crate::prelude!();

use rename::Level2;
use sha2::Sha256;


/// A SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; 32]);
impl Digest {
    /// Digest of some bytes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use mt_symex::hash::Digest;
    /// let digest = Digest::of("abc");
    /// assert_eq!(
    ///     digest.to_string(),
    ///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
    /// );
    /// ```
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        use sha2::Digest as _;
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self(hasher.finalize().into())
    }

    /// Bytes of the digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}
impl fmt::Display for Digest {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        for byte in &self.0 {
            write!(fmt, "{:02x}", byte)?
        }
        Ok(())
    }
}
impl fmt::Debug for Digest {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Digest({})", self)
    }
}

/// Bookkeeping identifiers ignored by state hashing, matched as substrings.
pub const DENYLIST: [&str; 8] = [
    "\\guard",
    "trds_count",
    "trds_in_run",
    "deadlock_wait",
    "deadlock_mutex",
    "count_lock",
    "count_wait",
    "unlocked",
];

/// True if an identifier is ignored by state hashing.
pub fn is_ignored(id: &str) -> bool {
    DENYLIST.iter().any(|ignored| id.contains(ignored))
}

/// Serialises the application of an operator.
type Serialiser = fn(&Level2, Op, &[Expr]) -> Res<String>;

/// Operator serialisers.
static OP_SERIALISERS: [(Op, Serialiser); 16] = [
    (Op::Ite, serialise_ite),
    (Op::Implies, serialise_normal_operation),
    (Op::Add, serialise_normal_operation),
    (Op::Sub, serialise_normal_operation),
    (Op::Mul, serialise_normal_operation),
    (Op::Div, serialise_normal_operation),
    (Op::IDiv, serialise_normal_operation),
    (Op::Mod, serialise_normal_operation),
    (Op::Ge, serialise_normal_operation),
    (Op::Le, serialise_normal_operation),
    (Op::Gt, serialise_normal_operation),
    (Op::Lt, serialise_normal_operation),
    (Op::Eq, serialise_normal_operation),
    (Op::Not, serialise_normal_operation),
    (Op::And, serialise_normal_operation),
    (Op::Or, serialise_normal_operation),
];

fn op_serialiser(op: Op) -> Option<Serialiser> {
    OP_SERIALISERS
        .iter()
        .find(|(candidate, _)| *candidate == op)
        .map(|(_, serialiser)| *serialiser)
}

/// Operator name followed by its parenthesized operands.
fn serialise_normal_operation(level2: &Level2, op: Op, args: &[Expr]) -> Res<String> {
    let mut s = op.smt_str().to_string();
    for arg in args {
        s.push('(');
        s.push_str(&serialise_expr(level2, arg)?);
        s.push(')');
    }
    Ok(s)
}

fn serialise_ite(level2: &Level2, op: Op, args: &[Expr]) -> Res<String> {
    if args.len() != 3 {
        bail!(ErrorKind::Unserialisable(format!(
            "`{}` application with {} argument(s)",
            op,
            args.len()
        )))
    }
    Ok(format!(
        "cond(if({}),then({}),else({}))",
        serialise_expr(level2, &args[0])?,
        serialise_expr(level2, &args[1])?,
        serialise_expr(level2, &args[2])?,
    ))
}

fn serialise_cst(cst: &Cst) -> String {
    match cst {
        Cst::B(b) => format!("const({})", if *b { 1 } else { 0 }),
        Cst::I(i) => format!("const({})", i),
        Cst::R(r) => format!("const({}/{})", r.numer(), r.denom()),
        Cst::S(s) => format!("string({:?})", s),
    }
}

/// Canonical string representation of a level-2 renamed value.
///
/// Symbols are replaced by the digest of their current value when there is one, and by their
/// original identifier otherwise. Operands of address-of are storage, not values: their symbols
/// are always serialised by name.
pub fn serialise_expr(level2: &Level2, expr: &Expr) -> Res<String> {
    let s = match expr {
        Expr::Sym(sym) => {
            if is_ignored(sym.id()) {
                return Ok("(ignore)".into());
            }
            let original = level2.original_name(sym.id());
            match level2.current_hash(original) {
                Some(digest) => format!("hash({})", digest),
                None => original.to_string(),
            }
        }
        Expr::Cst(cst) => serialise_cst(cst),
        Expr::Nondet(sym) => format!("nondet_symbol({})", level2.original_name(sym.id())),
        Expr::App { op, args } => match op_serialiser(*op) {
            Some(serialiser) => serialiser(level2, *op, args)?,
            None => bail!(ErrorKind::Unserialisable(format!("operator `{}`", op))),
        },
        Expr::AddrOf(arg) => format!("address_of({})", serialise_storage(level2, arg)?),
        Expr::Cast { typ, arg } => {
            format!("typecast({},{})", typ, serialise_expr(level2, arg)?)
        }
        Expr::ArrayOf { elem, .. } => format!("array(elem({}))", serialise_expr(level2, elem)?),
        Expr::With { base, at, val } => match base.typ() {
            Typ::Array(_) => format!(
                "array(prev({}),idx({}),val({}))",
                serialise_expr(level2, base)?,
                serialise_expr(level2, at)?,
                serialise_expr(level2, val)?,
            ),
            Typ::Struct(_) => format!(
                "struct(prev({}),member({}),val({}))",
                serialise_expr(level2, base)?,
                serialise_expr(level2, at)?,
                serialise_expr(level2, val)?,
            ),
            // Previous values of a union are overwritten, only the symbol matters.
            Typ::Union(_) => format!(
                "union_set(union_sym({}),field({}),val({}))",
                serialise_storage(level2, base)?,
                serialise_expr(level2, at)?,
                serialise_expr(level2, val)?,
            ),
            typ => bail!(ErrorKind::Unserialisable(format!(
                "with-update over type `{}`",
                typ
            ))),
        },
        Expr::Index { base, idx } => format!(
            "index({},idx({}))",
            serialise_expr(level2, base)?,
            serialise_expr(level2, idx)?
        ),
        Expr::Member { base, field, .. } => format!(
            "member(entity({}),member_name({}))",
            serialise_expr(level2, base)?,
            field
        ),
        Expr::Struct { typ, fields } => {
            let mut s = format!("struct(tag({}),", typ);
            for field in fields {
                s.push_str(&format!("({}),", serialise_expr(level2, field)?))
            }
            s.push(')');
            s
        }
        Expr::Union { typ, field, val } => format!(
            "union(tag({}),field({}),({}))",
            typ,
            field,
            serialise_expr(level2, val)?
        ),
    };
    Ok(s)
}

/// Serialises storage, symbols by original name.
fn serialise_storage(level2: &Level2, expr: &Expr) -> Res<String> {
    match expr {
        Expr::Sym(sym) => Ok(level2.original_name(sym.id()).to_string()),
        Expr::Index { base, idx } => Ok(format!(
            "index({},idx({}))",
            serialise_storage(level2, base)?,
            serialise_expr(level2, idx)?
        )),
        Expr::Member { base, field, .. } => Ok(format!(
            "member(entity({}),member_name({}))",
            serialise_storage(level2, base)?,
            field
        )),
        expr => serialise_expr(level2, expr),
    }
}

/// Digest of a level-2 renamed value.
pub fn value_digest(level2: &Level2, rhs: &Expr) -> Res<Digest> {
    let s = serialise_expr(level2, rhs)?;
    trace!("value digest input `{}`", s);
    Ok(Digest::of(s))
}

/// Digest of the level-2 value table, denylisted identifiers excluded.
///
/// Each binding contributes its original name, a `=` separator and its value digest. Names
/// never contain `=`.
pub fn l2_state_hash(level2: &Level2) -> Digest {
    let mut bytes = Vec::with_capacity(level2.current_hashes().len() * 40);
    for (id, digest) in level2.current_hashes() {
        if is_ignored(id) {
            continue;
        }
        bytes.extend_from_slice(id.as_bytes());
        bytes.push(b'=');
        bytes.extend_from_slice(digest.as_bytes())
    }
    Digest::of(bytes)
}

/// Digest of a whole state.
///
/// `positions` yields the location number of the current instruction of every thread, `None`
/// for threads with an empty call stack.
pub fn generate_hash(level2: &Level2, positions: impl IntoIterator<Item = Option<usize>>) -> Digest {
    let mut s = l2_state_hash(level2).to_string();
    let mut thread_count = 0;
    for position in positions {
        thread_count += 1;
        match position {
            Some(loc) => s.push_str(&format!("!{}", loc)),
            None => s.push_str("!end"),
        }
    }
    s.push_str(&format!("#{}", thread_count));
    Digest::of(s)
}
