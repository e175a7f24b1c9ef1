//! Thread-local symbolic execution: assignments, branches, calls.
//!
//! Gotos never fork. The state always continues at the earlier of the jump target and the next
//! instruction, and leaves a [`GotoState`] at the later one. States waiting at a location are
//! merged when the thread reaches it, with phi assignments for the names that differ.

crate::prelude!();

use program::Kind;
use state::{ExecutionState, GUARD_EXEC};
use thread::{Frame, GotoState};

impl ExecutionState {
    /// Thread-local execution of an instruction.
    pub(crate) fn symex_base(&mut self, kind: &Kind) -> Res<()> {
        match kind {
            Kind::Assign { lhs, rhs } => {
                self.symex_assign(lhs, rhs)?;
                self.active_mut().pc.index += 1
            }
            Kind::Decl(sym) => {
                let tid = self.active_thread;
                let l1 = self.threads[tid].declare(sym.id(), &mut self.level2);
                trace!("declared `{}` as `{}`", sym, l1);
                self.active_mut().pc.index += 1
            }
            Kind::Goto { cond, target } => self.symex_goto(cond, *target)?,
            Kind::Assume(cond) => {
                self.symex_assume(cond)?;
                self.active_mut().pc.index += 1
            }
            Kind::Assert { cond, msg } => {
                self.claim(cond, msg)?;
                self.active_mut().pc.index += 1
            }
            Kind::Call {
                lhs,
                function,
                args,
            } => self.symex_call(lhs.as_ref(), function, args)?,
            Kind::EndFunction => self.symex_end_function()?,
            Kind::Skip => self.active_mut().pc.index += 1,
            Kind::Return(_)
            | Kind::AtomicBegin
            | Kind::AtomicEnd
            | Kind::StartThread(_)
            | Kind::Yield
            | Kind::SwitchTo(_) => bail!(
                "thread-local execution of concurrent instruction {:?}",
                kind
            ),
        }
        Ok(())
    }

    /// Full renaming in the innermost frame of the active thread.
    pub(crate) fn rename(&mut self, expr: &mut Expr) {
        let thread = &self.threads[self.active_thread];
        rename::rename_expr(&thread.top().level1, &mut self.level2, expr)
    }

    /// Renaming of an assignment lhs: level 1 for the storage, full renaming for the indices.
    fn rename_lhs(&mut self, lhs: &mut Expr) {
        match lhs {
            Expr::Sym(_) => self.active().top().level1.rename(lhs),
            Expr::Index { base, idx } => {
                self.rename_lhs(base);
                self.rename(idx)
            }
            Expr::Member { base, .. } => self.rename_lhs(base),
            lhs => self.rename(lhs),
        }
    }

    /// Guard of the active thread.
    fn guard_expr(&self) -> Expr {
        self.active().guard.as_expr()
    }

    /// Assignment of a level-0 rhs to a level-0 lhs.
    pub(crate) fn symex_assign(&mut self, lhs: &Expr, rhs: &Expr) -> Res<()> {
        let mut rhs = rhs.clone();
        self.rename(&mut rhs);
        let mut lhs = lhs.clone();
        self.rename_lhs(&mut lhs);
        self.assign_l1(lhs, rhs)
    }

    /// Assignment of a level-2 rhs to a level-1 lhs.
    ///
    /// Indexed and member lhs are turned into with-updates of their base.
    fn assign_l1(&mut self, lhs: Expr, rhs: Expr) -> Res<()> {
        match lhs {
            Expr::Sym(mut sym) => {
                let rhs = rhs.simplify();
                self.level2.assign(&mut sym, &rhs, self.node_id, true)?;
                let guard = self.guard_expr();
                let source = self.source();
                self.sink
                    .with(|target| target.assignment(&guard, &sym, &rhs, &source))
            }
            Expr::Index { base, idx } => {
                let mut current = (*base).clone();
                self.level2.rename(&mut current);
                self.assign_l1(*base, Expr::with(current, *idx, rhs))
            }
            Expr::Member { base, field, .. } => {
                let mut current = (*base).clone();
                self.level2.rename(&mut current);
                let at = Expr::from(field.as_str());
                self.assign_l1(*base, Expr::with(current, at, rhs))
            }
            lhs => bail!("illegal assignment to `{}`", lhs),
        }
    }

    /// Assumption.
    ///
    /// Assuming `false` kills the path.
    fn symex_assume(&mut self, cond: &Expr) -> Res<()> {
        let mut cond = cond.clone();
        self.rename(&mut cond);
        self.assume_l2(cond)
    }

    /// Proof obligation.
    fn claim(&mut self, cond: &Expr, msg: &str) -> Res<()> {
        let mut cond = cond.clone();
        self.rename(&mut cond);
        let cond = cond.simplify();
        let trivial = cond.is_true();
        self.count_claim(trivial);
        if trivial {
            return Ok(());
        }
        let guard = self.guard_expr();
        let source = self.source();
        self.sink
            .with(|target| target.assertion(&guard, &cond, msg, &source))
    }

    /// Records a state waiting at some index of the innermost frame.
    ///
    /// Does nothing if the guard is `false`.
    fn push_goto_state(&mut self, index: usize, guard: thread::Guard) {
        if guard.is_false() {
            return;
        }
        let level2 = self.level2.clone();
        self.active_mut()
            .top_mut()
            .goto_states
            .entry(index)
            .or_insert_with(Vec::new)
            .push(GotoState { guard, level2 })
    }

    /// Conditional jump.
    fn symex_goto(&mut self, cond: &Expr, target: usize) -> Res<()> {
        let index = self.active().pc.index;
        let mut cond = cond.clone();
        self.rename(&mut cond);
        let cond = cond.simplify();

        if self.active().guard.is_false() || cond.is_false() {
            self.exit_loop(index);
            return Ok(());
        }

        let backward = target <= index;
        if backward {
            let unwind = self.conf.unwind;
            let iterations = {
                let count = self
                    .active_mut()
                    .top_mut()
                    .loop_iterations
                    .entry(index)
                    .or_insert(0);
                *count += 1;
                *count
            };
            if iterations > unwind {
                debug!(
                    "thread {}: unwinding bound {} reached at {}",
                    self.active_thread,
                    unwind,
                    self.active().pc
                );
                self.assume_l2(Expr::not(cond))?;
                self.exit_loop(index);
                return Ok(());
            }
        }

        let (continue_cond, continue_at, pending_cond, pending_at) = if backward {
            (cond.clone(), target, Expr::not(cond), index + 1)
        } else {
            (Expr::not(cond.clone()), index + 1, cond, target)
        };

        let mut pending = self.active().guard.clone();
        pending.add(pending_cond);
        self.push_goto_state(pending_at, pending);

        let thread = self.active_mut();
        thread.guard.add(continue_cond);
        thread.pc.index = continue_at;
        Ok(())
    }

    /// Falls through the goto at `index`, the next entry of its loop unwinds from scratch.
    fn exit_loop(&mut self, index: usize) {
        let thread = self.active_mut();
        let _ = thread.top_mut().loop_iterations.remove(&index);
        thread.pc.index += 1
    }

    /// Assumption of a level-2 renamed condition.
    fn assume_l2(&mut self, cond: Expr) -> Res<()> {
        let cond = cond.simplify();
        if cond.is_true() {
            return Ok(());
        }
        let guard = self.guard_expr();
        let source = self.source();
        self.sink
            .with(|target| target.assumption(&guard, &cond, &source))?;
        if cond.is_false() {
            self.active_mut().guard.make_false()
        }
        Ok(())
    }

    /// Merges the states waiting at the current location.
    pub(crate) fn merge_gotos(&mut self) -> Res<()> {
        let index = self.active().pc.index;
        let states = match self.active_mut().top_mut().goto_states.remove(&index) {
            Some(states) => states,
            None => return Ok(()),
        };
        debug!(
            "thread {}: merging {} state(s) at {}",
            self.active_thread,
            states.len(),
            self.active().pc
        );
        for goto_state in states {
            if self.active().guard.is_false() {
                self.level2.adopt_values(&goto_state.level2);
                self.active_mut().guard = goto_state.guard;
                continue;
            }
            self.phi_function(&goto_state)?;
            self.active_mut().guard.merge(&goto_state.guard)
        }
        Ok(())
    }

    /// Phi assignments for the names that differ between the current state and a goto state.
    fn phi_function(&mut self, goto_state: &GotoState) -> Res<()> {
        let mut diff_guard = goto_state.guard.clone();
        diff_guard.remove_prefix(&self.active().guard);
        let cond = diff_guard.as_expr();
        let source = self.source();

        for (l1, typ) in self.level2.diff(&goto_state.level2) {
            let original = self.level2.original_name(&l1).to_string();
            if original.starts_with(GUARD_EXEC) {
                continue;
            }
            let taken = goto_state.level2.value_of(&l1, &typ);
            let current = self.level2.value_of(&l1, &typ);
            if taken == current {
                continue;
            }
            for value in &[&taken, &current] {
                if let Expr::Sym(sym) = value {
                    self.level2.register_original(sym.id(), original.clone())
                }
            }
            let rhs = Expr::ite(cond.clone(), taken, current);
            let mut lhs = Symbol::new(l1, typ);
            self.level2.assign(&mut lhs, &rhs, self.node_id, false)?;
            self.sink
                .with(|target| target.assignment(&Expr::from(true), &lhs, &rhs, &source))?
        }
        Ok(())
    }

    /// Function call.
    fn symex_call(&mut self, lhs: Option<&Expr>, function: &str, args: &[Expr]) -> Res<()> {
        let params = self.program.get_function(function)?.params.clone();
        if params.len() != args.len() {
            bail!(
                "`{}` expects {} argument(s), called with {}",
                function,
                params.len(),
                args.len()
            )
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let mut value = arg.clone();
            self.rename(&mut value);
            values.push(value)
        }
        let return_lhs = lhs.map(|lhs| {
            let mut lhs = lhs.clone();
            self.rename_lhs(&mut lhs);
            lhs
        });

        let tid = self.active_thread;
        {
            let thread = &mut self.threads[tid];
            let mut frame = Frame::new(function, thread.top().level1.clone());
            frame.calling_location = Some(thread.pc.next());
            frame.return_lhs = return_lhs;
            thread.call_stack.push(frame);
            thread.pc = Loc::new(function, 0);
        }
        trace!("thread {} calls `{}`", tid, function);

        for (param, value) in params.into_iter().zip(values) {
            let l1 = self.threads[tid].declare(param.id(), &mut self.level2);
            self.assign_l1(Expr::sym(Symbol::new(l1, param.typ())), value)?
        }
        Ok(())
    }

    /// Return: assigns the returned value, jumps to the end of the function.
    pub(crate) fn symex_return(&mut self, value: Option<&Expr>) -> Res<()> {
        if let (Some(value), Some(lhs)) = (value, self.active().top().return_lhs.clone()) {
            let mut rhs = value.clone();
            self.rename(&mut rhs);
            self.assign_l1(lhs, rhs)?
        }

        let function = self.active().pc.function.clone();
        let end = self.program.get_function(&function)?.end_index();
        let index = self.active().pc.index;
        if end > index + 1 {
            let guard = self.active().guard.clone();
            self.push_goto_state(end, guard);
            self.active_mut().guard.make_false()
        }
        Ok(())
    }

    /// End of a function that is not a thread's root function.
    fn symex_end_function(&mut self) -> Res<()> {
        let thread = self.active_mut();
        let frame = match thread.call_stack.pop() {
            Some(frame) => frame,
            None => bail!("ending a function with an empty call stack"),
        };
        match frame.calling_location {
            Some(loc) => {
                trace!("thread {} returns from `{}`", thread.thread_id(), frame.function);
                thread.pc = loc;
                Ok(())
            }
            None => bail!("`{}` has no caller to return to", frame.function),
        }
    }
}

