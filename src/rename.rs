//! Two-level renaming, turns expressions into SSA form.
//!
//! - [`Level1`] disambiguates declarations: a local `x` declared for the `v`-th time in thread
//!   `t` becomes `x@v!t`. There is one level-1 context per call frame. Identifiers the context
//!   does not know (globals) are left unchanged.
//! - [`Level2`] disambiguates assignments: the `c`-th assignment to level-1 name `l1`, performed
//!   at node `n`, produces `l1&n#c`. There is one level-2 context per execution state, shared by
//!   all its threads.
//!
//! The `#` character is reserved: an identifier containing it is a level-2 name.
//!
//! Level 2 also performs constant propagation: reading a name whose last assignment was a
//! propagatable expression yields that expression instead of the SSA name.

crate::prelude!();

use hash::Digest;


/// True if an identifier is a level-2 name.
pub fn is_l2(id: &str) -> bool {
    id.contains('#')
}

/// Full renaming, level 1 then level 2.
///
/// Operands of address-of go through [`rename_address`].
pub fn rename_expr(level1: &Level1, level2: &mut Level2, expr: &mut Expr) {
    match expr {
        Expr::AddrOf(arg) => rename_address(level1, level2, arg),
        Expr::Sym(_) => {
            level1.rename(expr);
            level2.rename(expr)
        }
        Expr::Nondet(_) | Expr::Cst(_) => (),
        expr => {
            for sub in expr.subs_mut() {
                rename_expr(level1, level2, sub)
            }
        }
    }
}

/// Renaming of an expression appearing under an address-of.
///
/// Symbols only get level-1 renamed. Indices are values and are fully renamed.
pub fn rename_address(level1: &Level1, level2: &mut Level2, expr: &mut Expr) {
    match expr {
        Expr::Sym(_) => level1.rename(expr),
        Expr::Index { base, idx } => {
            rename_address(level1, level2, base);
            rename_expr(level1, level2, idx)
        }
        Expr::Member { base, .. } => rename_address(level1, level2, base),
        expr => rename_expr(level1, level2, expr),
    }
}

/// Level-1 renaming context, one per call frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level1 {
    /// Thread owning this context.
    thread: ThreadId,
    /// Maps original identifiers to their current declaration version.
    current_names: Map<String, usize>,
}
impl Level1 {
    /// Empty context.
    pub fn new(thread: ThreadId) -> Self {
        Self {
            thread,
            current_names: Map::new(),
        }
    }

    /// Thread owning this context.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Level-1 name of `id` at some version.
    pub fn name(&self, id: &str, version: usize) -> String {
        format!("{}@{}!{}", id, version, self.thread)
    }

    /// Registers a new version for `id`, returns the corresponding level-1 name.
    pub fn declare(&mut self, id: &str, version: usize) -> String {
        let _prev = self.current_names.insert(id.into(), version);
        self.name(id, version)
    }

    /// True if `id` is declared in this context.
    pub fn is_local(&self, id: &str) -> bool {
        self.current_names.contains_key(id)
    }

    /// Level-1 identifier of `id`, `id` itself if it is not local.
    pub fn identifier(&self, id: &str) -> String {
        match self.current_names.get(id) {
            Some(version) => self.name(id, *version),
            None => id.into(),
        }
    }

    /// Level-1 renaming of an expression.
    pub fn rename(&self, expr: &mut Expr) {
        match expr {
            Expr::Sym(sym) => {
                let l1 = self.identifier(sym.id());
                sym.set_id(l1)
            }
            Expr::AddrOf(arg) => self.rename_address(arg),
            Expr::Nondet(_) | Expr::Cst(_) => (),
            expr => {
                for sub in expr.subs_mut() {
                    self.rename(sub)
                }
            }
        }
    }

    /// Level-1 renaming of an expression appearing under an address-of.
    pub fn rename_address(&self, expr: &mut Expr) {
        match expr {
            Expr::Sym(sym) => {
                let l1 = self.identifier(sym.id());
                sym.set_id(l1)
            }
            Expr::Index { base, idx } => {
                self.rename_address(base);
                self.rename(idx)
            }
            Expr::Member { base, .. } => self.rename_address(base),
            expr => self.rename(expr),
        }
    }
}

/// Level-2 flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// No value digests.
    Plain,
    /// Every assignment records a digest of its value.
    StateHashing,
}

/// Level-2 information about a level-1 name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Count of the current version.
    pub count: usize,
    /// Value of the last assignment, if propagatable.
    pub constant: Option<Expr>,
    /// Node of the last assignment.
    pub node_id: NodeId,
    /// Type of the name.
    pub typ: Typ,
}

/// Level-2 renaming context, one per execution state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level2 {
    /// Flavor.
    flavor: Flavor,
    /// Maximal with-update nesting for constant propagation.
    max_with_depth: usize,
    /// Maps level-1 names to their current entry.
    current_names: Map<String, Entry>,
    /// Maps level-1 names to the highest count ever used, never decreases.
    last_counts: Map<String, usize>,
    /// Maps every generated name, level 1 or 2, to its original identifier.
    original_identifiers: Map<String, String>,
    /// Maps original identifiers to the digest of their last value.
    current_hashes: Map<String, Digest>,
}
impl Level2 {
    /// Empty context.
    pub fn new(flavor: Flavor, max_with_depth: usize) -> Self {
        Self {
            flavor,
            max_with_depth,
            current_names: Map::new(),
            last_counts: Map::new(),
            original_identifiers: Map::new(),
            current_hashes: Map::new(),
        }
    }

    /// Flavor accessor.
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Level-2 name of a level-1 name.
    pub fn name(l1: &str, node_id: NodeId, count: usize) -> String {
        format!("{}&{}#{}", l1, node_id, count)
    }

    /// Entry of a level-1 name.
    pub fn entry(&self, l1: &str) -> Option<&Entry> {
        self.current_names.get(l1)
    }
    /// Entries, by level-1 name.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.current_names.iter()
    }

    /// Digests of the last values, by original identifier.
    pub fn current_hashes(&self) -> &Map<String, Digest> {
        &self.current_hashes
    }
    /// Digest of the last value of an original identifier.
    pub fn current_hash(&self, original: &str) -> Option<&Digest> {
        self.current_hashes.get(original)
    }

    /// Registers a generated name.
    pub fn register_original(&mut self, name: impl Into<String>, original: impl Into<String>) {
        let _prev = self.original_identifiers.insert(name.into(), original.into());
    }

    /// Original identifier of a generated name, `id` itself if unknown.
    pub fn original_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.original_identifiers
            .get(id)
            .map(String::as_str)
            .unwrap_or(id)
    }

    /// Maps all the symbols of an expression back to their original identifier.
    pub fn original_expr(&self, expr: &mut Expr) {
        match expr {
            Expr::Sym(sym) | Expr::Nondet(sym) => {
                let original = self.original_name(sym.id()).to_string();
                sym.set_id(original)
            }
            expr => {
                for sub in expr.subs_mut() {
                    self.original_expr(sub)
                }
            }
        }
    }

    /// Level-2 renaming of an expression.
    ///
    /// Level-2 names are left untouched, so are the operands of address-of.
    pub fn rename(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Sym(sym) => {
                if is_l2(sym.id()) {
                    return;
                }
                let (l2, constant) = match self.current_names.get(sym.id()) {
                    Some(Entry {
                        constant: Some(cst),
                        ..
                    }) => (None, Some(cst.clone())),
                    Some(entry) => (
                        Some(Self::name(sym.id(), entry.node_id, entry.count)),
                        None,
                    ),
                    None => (Some(Self::name(sym.id(), 0, 0)), None),
                };
                if let Some(cst) = constant {
                    *expr = cst;
                } else if let Some(l2) = l2 {
                    let original = self.original_name(sym.id()).to_string();
                    self.register_original(l2.clone(), original);
                    sym.set_id(l2)
                }
            }
            Expr::AddrOf(_) | Expr::Nondet(_) | Expr::Cst(_) => (),
            expr => {
                for sub in expr.subs_mut() {
                    self.rename(sub)
                }
            }
        }
    }

    /// Level-2 assignment.
    ///
    /// - `lhs` is a symbol with a level-1 identifier, it becomes the fresh level-2 name;
    /// - `rhs` is the level-2 renamed value;
    /// - `record_value` activates constant propagation for this assignment.
    ///
    /// In the [`Flavor::StateHashing`] flavor, the digest of `rhs` is recorded for the original
    /// identifier of `lhs` *before* the assignment takes place, so that `x := x + 1` serialises
    /// the previous value of `x`.
    pub fn assign(
        &mut self,
        lhs: &mut Symbol,
        rhs: &Expr,
        node_id: NodeId,
        record_value: bool,
    ) -> Res<()> {
        let digest = match self.flavor {
            Flavor::StateHashing => Some(hash::value_digest(self, rhs)?),
            Flavor::Plain => None,
        };

        let l1 = lhs.id().to_string();
        let original = self.original_name(&l1).to_string();
        let constant = if record_value && self.constant_propagation(rhs) {
            Some(rhs.clone())
        } else {
            None
        };

        let count = self.next_count(&l1);
        let _prev = self.current_names.insert(
            l1.clone(),
            Entry {
                count,
                constant,
                node_id,
                typ: lhs.typ(),
            },
        );
        let l2 = Self::name(&l1, node_id, count);

        self.register_original(l2.clone(), original.clone());
        lhs.set_id(l2);

        if let Some(digest) = digest {
            let _prev = self.current_hashes.insert(original, digest);
        }
        Ok(())
    }

    /// Level-2 renaming of a symbol without a value.
    ///
    /// Bumps the counter like [`Level2::assign`], but records neither a constant nor a digest.
    pub fn fresh(&mut self, lhs: &mut Symbol, node_id: NodeId) {
        let l1 = lhs.id().to_string();
        let original = self.original_name(&l1).to_string();
        let count = self.next_count(&l1);
        let _prev = self.current_names.insert(
            l1.clone(),
            Entry {
                count,
                constant: None,
                node_id,
                typ: lhs.typ(),
            },
        );
        let l2 = Self::name(&l1, node_id, count);
        self.register_original(l2.clone(), original);
        lhs.set_id(l2)
    }

    /// Allocates the next count of a level-1 name.
    fn next_count(&mut self, l1: &str) -> usize {
        let count = self.last_counts.entry(l1.into()).or_insert(0);
        *count += 1;
        *count
    }

    /// Current value of a level-1 name: its constant if any, its level-2 name otherwise.
    pub fn value_of(&self, l1: &str, typ: &Typ) -> Expr {
        match self.current_names.get(l1) {
            Some(Entry {
                constant: Some(cst),
                ..
            }) => cst.clone(),
            Some(entry) => Expr::sym(Symbol::new(
                Self::name(l1, entry.node_id, entry.count),
                typ.clone(),
            )),
            None => Expr::sym(Symbol::new(Self::name(l1, 0, 0), typ.clone())),
        }
    }

    /// Level-1 names whose entries differ between two contexts, with their type.
    pub fn diff(&self, other: &Self) -> Vec<(String, Typ)> {
        let mut res = vec![];
        for (l1, entry) in self.current_names.iter() {
            let differs = other
                .current_names
                .get(l1)
                .map(|that| that.count != entry.count || that.node_id != entry.node_id)
                .unwrap_or(true);
            if differs {
                res.push((l1.clone(), entry.typ.clone()))
            }
        }
        for (l1, entry) in other.current_names.iter() {
            if !self.current_names.contains_key(l1) {
                res.push((l1.clone(), entry.typ.clone()))
            }
        }
        res
    }

    /// Takes the values of another context.
    ///
    /// Counts never decrease and the reverse map keeps the names of both contexts.
    pub fn adopt_values(&mut self, other: &Self) {
        self.current_names = other.current_names.clone();
        self.current_hashes = other.current_hashes.clone();
        for (l1, count) in other.last_counts.iter() {
            let mine = self.last_counts.entry(l1.clone()).or_insert(0);
            *mine = std::cmp::max(*mine, *count)
        }
        for (name, original) in other.original_identifiers.iter() {
            if !self.original_identifiers.contains_key(name) {
                self.register_original(name.clone(), original.clone())
            }
        }
    }

    /// True if an expression can be propagated.
    pub fn constant_propagation(&self, expr: &Expr) -> bool {
        self.constant_propagation_at(expr, 0)
    }

    fn constant_propagation_at(&self, expr: &Expr, with_depth: usize) -> bool {
        match expr {
            Expr::Cst(_) => true,
            Expr::AddrOf(arg) => self.constant_propagation_reference(arg),
            Expr::Cast { arg, .. } => self.constant_propagation_at(arg, 0),
            Expr::App { op: Op::Add, args } => {
                args.iter().all(|arg| self.constant_propagation_at(arg, 0))
            }
            Expr::ArrayOf { elem, .. } => match elem.as_ref() {
                Expr::Cst(cst) => cst.typ() != Typ::Bool,
                _ => false,
            },
            Expr::With { base, .. } => {
                with_depth < self.max_with_depth
                    && self.constant_propagation_at(base, with_depth + 1)
            }
            // Only the first field is checked.
            Expr::Struct { fields, .. } => fields
                .first()
                .map(|field| self.constant_propagation_at(field, 0))
                .unwrap_or(true),
            Expr::Union { val, .. } => self.constant_propagation_at(val, 0),
            Expr::Sym(_)
            | Expr::Nondet(_)
            | Expr::App { .. }
            | Expr::Index { .. }
            | Expr::Member { .. } => false,
        }
    }

    /// True if a reference can be propagated.
    pub fn constant_propagation_reference(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Sym(_) | Expr::Cst(Cst::S(_)) => true,
            Expr::Index { base, idx } => {
                self.constant_propagation_reference(base) && self.constant_propagation(idx)
            }
            Expr::Member { base, .. } => self.constant_propagation_reference(base),
            _ => false,
        }
    }
}
