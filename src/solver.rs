//! SMT-LIB 2 target, backed by an [`rsmt2::Solver`].
//!
//! SSA symbols are declared lazily, the first time a step mentions them. Declarations follow
//! the context stack: a symbol declared after a [`Target::push_ctx`] is forgotten by the matching
//! [`Target::pop_ctx`] and re-declared if needed.

crate::prelude!();

use std::path::PathBuf;

use rsmt2::{parse::SmtParser as RSmtParser, SmtConf, Solver};

use target::{Step, Target, Tv};


/// Parses SMT-LIB constants: booleans, numerals, decimals, and negations or divisions of those.
///
/// # Examples
///
/// ```rust
/// # use mt_symex::{expr::Cst, solver::parse_cst};
/// assert_eq!(parse_cst("true"), Some(Cst::B(true)));
/// assert_eq!(parse_cst("(- 7)"), Some(Cst::from(-7)));
/// assert_eq!(parse_cst("(/ 1.0 4.0)"), Some(Cst::from((1usize, 4usize))));
/// assert_eq!(parse_cst("(f 3)"), None);
/// ```
pub fn parse_cst(txt: &str) -> Option<Cst> {
    let mut parser = CstParser::new(txt);
    let cst = parser.term()?;
    if parser.cursor == parser.tokens.len() {
        Some(cst)
    } else {
        None
    }
}

/// Token-level parser for constants.
struct CstParser<'txt> {
    tokens: Vec<&'txt str>,
    cursor: usize,
}
impl<'txt> CstParser<'txt> {
    fn new(txt: &'txt str) -> Self {
        let mut tokens = vec![];
        let mut start = None;
        for (pos, c) in txt.char_indices() {
            if c == '(' || c == ')' || c.is_whitespace() {
                if let Some(start) = start.take() {
                    tokens.push(&txt[start..pos])
                }
                if !c.is_whitespace() {
                    tokens.push(&txt[pos..pos + 1])
                }
            } else if start.is_none() {
                start = Some(pos)
            }
        }
        if let Some(start) = start {
            tokens.push(&txt[start..])
        }
        Self { tokens, cursor: 0 }
    }

    fn next(&mut self) -> Option<&'txt str> {
        let token = self.tokens.get(self.cursor).copied();
        self.cursor += 1;
        token
    }
    fn close(&mut self) -> Option<()> {
        if self.next()? == ")" {
            Some(())
        } else {
            None
        }
    }

    fn term(&mut self) -> Option<Cst> {
        match self.next()? {
            "true" => Some(Cst::B(true)),
            "false" => Some(Cst::B(false)),
            "(" => match self.next()? {
                "-" => {
                    let cst = match self.term()? {
                        Cst::I(i) => Cst::I(-i),
                        Cst::R(r) => Cst::R(-r),
                        Cst::B(_) | Cst::S(_) => return None,
                    };
                    self.close()?;
                    Some(cst)
                }
                "/" => {
                    let num = Self::to_rat(self.term()?)?;
                    let den = Self::to_rat(self.term()?)?;
                    self.close()?;
                    if den.is_zero() {
                        None
                    } else {
                        Some(Cst::R(num / den))
                    }
                }
                _ => None,
            },
            token => Self::numeral(token),
        }
    }

    fn to_rat(cst: Cst) -> Option<Rat> {
        match cst {
            Cst::I(i) => Some(Rat::from_integer(i)),
            Cst::R(r) => Some(r),
            Cst::B(_) | Cst::S(_) => None,
        }
    }

    fn numeral(token: &str) -> Option<Cst> {
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        match token.find('.') {
            None if digits(token) => Int::parse_bytes(token.as_bytes(), 10).map(Cst::I),
            Some(dot) => {
                let (int, frac) = (&token[..dot], &token[dot + 1..]);
                if !digits(int) || !digits(frac) {
                    return None;
                }
                let den = Int::from(10).pow(frac.len() as u32);
                let num = Int::parse_bytes(int.as_bytes(), 10)? * &den
                    + Int::parse_bytes(frac.as_bytes(), 10)?;
                Some(Cst::R(Rat::new(num, den)))
            }
            None => None,
        }
    }
}

/// SMT-LIB parser for idents, types and values of the models of an [`SmtTarget`].
#[derive(Debug, Clone, Copy)]
pub struct Parser;

impl<'a> rsmt2::parse::IdentParser<String, Typ, &'a str> for Parser {
    fn parse_ident(self, input: &'a str) -> SmtRes<String> {
        Ok(input.trim().trim_matches('|').into())
    }
    fn parse_type(self, input: &'a str) -> SmtRes<Typ> {
        match input {
            "Bool" => Ok(Typ::Bool),
            "Int" => Ok(Typ::Int),
            "Real" => Ok(Typ::Rat),
            _ => bail!("unexpected type string `{}`", input),
        }
    }
}
impl<'a, Br: std::io::BufRead> rsmt2::parse::ModelParser<String, Typ, Cst, &'a mut RSmtParser<Br>>
    for Parser
{
    fn parse_value(
        self,
        input: &'a mut RSmtParser<Br>,
        _: &String,
        _: &[(String, Typ)],
        _: &Typ,
    ) -> SmtRes<Cst> {
        let sexpr = input.get_sexpr()?;
        parse_cst(sexpr).ok_or_else(|| format!("expected constant, got `{}`", sexpr).into())
    }
}

/// Outcome of checking the claims of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No claim can be violated.
    Safe,
    /// Some claim can be violated, with the values of the SSA symbols in the model.
    Violated(Vec<(String, Cst)>),
    /// The solver could not decide.
    Unknown,
}

/// A target asserting steps in an SMT solver.
pub struct SmtTarget {
    /// Solver configuration, used again by clones.
    conf: SmtConf,
    /// Solver.
    solver: Solver<Parser>,
    /// Steps recorded, oldest first.
    steps: Vec<Step>,
    /// Number of steps at each open context.
    ctx: Vec<usize>,
    /// Declared symbols, one set per context level, root level first.
    declared: Vec<Set<String>>,
    /// Options set so far, replayed by clones.
    options: Vec<(String, Either<Cst, String>)>,
}
impl SmtTarget {
    /// Spawns a solver.
    ///
    /// `tee` logs the whole SMT-LIB conversation to a file.
    pub fn new(mut conf: SmtConf, tee: Option<PathBuf>) -> Res<Self> {
        conf.check_success();
        let mut solver = conf
            .clone()
            .spawn(Parser)
            .chain_err(|| "while spawning the SMT solver")?;
        if let Some(path) = tee {
            solver.path_tee(path)?
        }
        Ok(Self {
            conf,
            solver,
            steps: vec![],
            ctx: vec![],
            declared: vec![Set::new()],
            options: vec![],
        })
    }

    /// Sets a solver option, string values are quoted.
    pub fn set_option(&mut self, key: &str, val: Either<Cst, String>) -> Res<()> {
        match &val {
            Either::Left(cst) => self.solver.set_option(key, cst)?,
            Either::Right(s) => self.solver.set_option(key, format!("\"{}\"", s))?,
        }
        self.options.push((key.into(), val));
        Ok(())
    }

    /// Z3 target, `z3` must be in the path.
    pub fn z3(tee: Option<PathBuf>) -> Res<Self> {
        Self::new(SmtConf::default_z3(), tee)
    }

    fn is_declared(&self, id: &str) -> bool {
        self.declared.iter().any(|level| level.contains(id))
    }

    /// Declares the symbols of an expression the solver does not know about yet.
    fn declare(&mut self, expr: &Expr) -> Res<()> {
        let mut symbols = vec![];
        collect_symbols(expr, &mut symbols);
        for sym in symbols {
            if self.is_declared(sym.id()) {
                continue;
            }
            self.solver
                .declare_const(sym, sym.typ_ref())
                .chain_err(|| format!("while declaring `{}`", sym))?;
            if let Some(level) = self.declared.last_mut() {
                let _ = level.insert(sym.id().to_string());
            }
        }
        Ok(())
    }

    /// Declares the symbols of a step and asserts it unless it is an assertion.
    fn record(&mut self, step: Step) -> Res<()> {
        let fact = step.to_expr();
        self.declare(&fact)?;
        if !step.is_assertion() {
            self.solver
                .assert(&fact)
                .chain_err(|| format!("while asserting `{}`", step))?
        }
        self.steps.push(step);
        Ok(())
    }

    /// Checks whether some claim recorded so far can be violated.
    pub fn check_claims(&mut self) -> Res<Verdict> {
        let claims: Vec<Expr> = self
            .steps
            .iter()
            .filter(|step| step.is_assertion())
            .map(Step::to_expr)
            .collect();
        if claims.is_empty() {
            return Ok(Verdict::Safe);
        }
        let violation = Expr::or(claims.into_iter().map(Expr::not).collect());

        self.solver.push(1)?;
        self.solver
            .assert(&violation)
            .chain_err(|| "while asserting claim violation")?;
        let verdict = match self.solver.check_sat_or_unk()? {
            Some(true) => {
                let model = self
                    .solver
                    .get_model()
                    .chain_err(|| "while retrieving counterexample")?;
                let mut values: Vec<(String, Cst)> = model
                    .into_iter()
                    .map(|(id, _, _, val)| (id, val))
                    .collect();
                values.sort_by(|(lft, _), (rgt, _)| lft.cmp(rgt));
                Verdict::Violated(values)
            }
            Some(false) => Verdict::Safe,
            None => Verdict::Unknown,
        };
        self.solver.pop(1)?;
        Ok(verdict)
    }

    /// Satisfiability of the facts recorded so far and an additional one.
    fn check_with(&mut self, fact: &Expr) -> Res<Option<bool>> {
        self.solver.push(1)?;
        self.solver
            .assert(fact)
            .chain_err(|| format!("while asserting `{}`", fact))?;
        let res = self.solver.check_sat_or_unk();
        self.solver.pop(1)?;
        Ok(res?)
    }
}

/// Symbols of an expression, nondet symbols included.
fn collect_symbols<'a>(expr: &'a Expr, symbols: &mut Vec<&'a Symbol>) {
    match expr {
        Expr::Sym(sym) | Expr::Nondet(sym) => symbols.push(sym),
        expr => {
            for sub in expr.subs() {
                collect_symbols(sub, symbols)
            }
        }
    }
}

impl Target for SmtTarget {
    fn assignment(
        &mut self,
        guard: &Expr,
        lhs: &Symbol,
        rhs: &Expr,
        source: &Source,
    ) -> Res<()> {
        self.record(Step::Assignment {
            guard: guard.clone(),
            lhs: lhs.clone(),
            rhs: rhs.clone(),
            source: source.clone(),
        })
    }
    fn assumption(&mut self, guard: &Expr, fact: &Expr, source: &Source) -> Res<()> {
        self.record(Step::Assumption {
            guard: guard.clone(),
            fact: fact.clone(),
            source: source.clone(),
        })
    }
    fn assertion(&mut self, guard: &Expr, cond: &Expr, msg: &str, source: &Source) -> Res<()> {
        self.record(Step::Assertion {
            guard: guard.clone(),
            cond: cond.clone(),
            msg: msg.into(),
            source: source.clone(),
        })
    }

    fn ask_solver_question(&mut self, question: &Expr) -> Res<Tv> {
        let simplified = question.clone().simplify();
        if simplified.is_true() {
            return Ok(Tv::True);
        } else if simplified.is_false() {
            return Ok(Tv::False);
        }
        // Declarations must survive the local contexts.
        self.declare(&simplified)?;
        if self.check_with(&simplified)? == Some(false) {
            return Ok(Tv::False);
        }
        if self.check_with(&Expr::not(simplified))? == Some(false) {
            return Ok(Tv::True);
        }
        Ok(Tv::Unknown)
    }

    fn push_ctx(&mut self) -> Res<()> {
        self.solver.push(1)?;
        self.ctx.push(self.steps.len());
        self.declared.push(Set::new());
        Ok(())
    }
    fn pop_ctx(&mut self) -> Res<()> {
        let len = match self.ctx.pop() {
            Some(len) => len,
            None => bail!("cannot pop context: no context is open"),
        };
        self.solver.pop(1)?;
        self.steps.truncate(len);
        let _ = self.declared.pop();
        Ok(())
    }

    /// Spawns a new solver and replays the steps, contexts included.
    fn box_clone(&self) -> Res<Box<dyn Target>> {
        let mut clone = Self::new(self.conf.clone(), None)?;
        for (key, val) in &self.options {
            clone.set_option(key, val.clone())?
        }
        let mut ctx = self.ctx.iter().peekable();
        for (idx, step) in self.steps.iter().enumerate() {
            while ctx.peek() == Some(&&idx) {
                let _ = ctx.next();
                clone.push_ctx()?
            }
            clone.record(step.clone())?
        }
        for _ in ctx {
            clone.push_ctx()?
        }
        Ok(Box::new(clone))
    }

    fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl fmt::Debug for SmtTarget {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("SmtTarget")
            .field("steps", &self.steps.len())
            .field("ctx", &self.ctx)
            .finish()
    }
}
