//! Depth-first exploration of the interleavings of a program.
//!
//! The [`Explorer`] only uses the public surface of [`ExecutionState`]. It steps the active
//! thread until a context-switch point, then forks one state per thread worth scheduling, one
//! at a time so that incremental sinks see their contexts pushed and popped in DFS order.

crate::prelude!();

use hash::Digest;
use state::{Claims, ExecutionState};


/// Exploration statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    /// Interleavings explored to completion.
    pub interleavings: usize,
    /// Interleavings abandoned: unviable, or without a thread worth scheduling.
    pub pruned: usize,
    /// States dropped because an equivalent state was already explored.
    pub deduplicated: usize,
    /// Claims of the completed interleavings and of the deduplicated states.
    pub claims: Claims,
}
impl fmt::Display for Report {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{} interleaving(s), {} pruned, {} deduplicated, {} claim(s) ({} remaining)",
            self.interleavings,
            self.pruned,
            self.deduplicated,
            self.claims.total,
            self.claims.remaining
        )
    }
}

/// Callback run on every completed interleaving and every deduplicated state.
pub type OnLeaf<'a> = Box<dyn FnMut(&mut ExecutionState) -> Res<()> + 'a>;

/// Depth-first explorer.
pub struct Explorer<'a> {
    /// Digests of the states explored so far, state hashing only.
    seen: Set<Digest>,
    /// Statistics.
    report: Report,
    /// Leaf callback.
    on_leaf: Option<OnLeaf<'a>>,
}
impl<'a> Default for Explorer<'a> {
    fn default() -> Self {
        Self::new()
    }
}
impl<'a> Explorer<'a> {
    /// Constructor.
    pub fn new() -> Self {
        Self {
            seen: Set::new(),
            report: Report::default(),
            on_leaf: None,
        }
    }

    /// Sets the callback run on every completed interleaving.
    ///
    /// It also runs on every state dropped by deduplication: exploration stops there, but the
    /// claims the state emitted on its way still need to be checked.
    pub fn on_leaf(mut self, f: impl FnMut(&mut ExecutionState) -> Res<()> + 'a) -> Self {
        self.on_leaf = Some(Box::new(f));
        self
    }

    /// Explores all the interleavings reachable from a state.
    pub fn explore(mut self, root: ExecutionState) -> Res<Report> {
        self.explore_state(root)?;
        info!("exploration done: {}", self.report);
        Ok(self.report)
    }

    fn explore_state(&mut self, mut state: ExecutionState) -> Res<()> {
        loop {
            while state.can_execution_continue() && !state.has_cswitch_point_occured() {
                state.symex_step()?
            }

            if state.interleaving_unviable() {
                debug!("pruning unviable interleaving at node {}", state.node_id());
                self.report.pruned += 1;
                return Ok(());
            }

            state.calculate_mpor_constraints();

            if state.conf().state_hashing {
                let digest = state.generate_hash();
                if !self.seen.insert(digest) {
                    debug!("state {} already explored", digest);
                    self.report.deduplicated += 1;
                    return self.settle(state);
                }
            }

            let live: Vec<ThreadId> = (0..state.thread_count())
                .filter(|tid| state.thread(*tid).can_continue())
                .collect();
            if live.is_empty() {
                return self.leaf(state);
            }

            let candidates = Self::candidates(&mut state, &live);
            match candidates.as_slice() {
                [] => {
                    debug!(
                        "no thread worth scheduling at node {}, pruning",
                        state.node_id()
                    );
                    self.report.pruned += 1;
                    return Ok(());
                }
                [next] => state.commit_transition(*next)?,
                _ => {
                    for next in candidates {
                        let mut child = state.try_clone()?;
                        child.commit_transition(next)?;
                        self.explore_state(child)?
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Threads to run from a context-switch point.
    fn candidates(state: &mut ExecutionState, live: &[ThreadId]) -> Vec<ThreadId> {
        let active = state.active_thread();
        let active_live = state.can_execution_continue();

        // No switch inside an atomic section, even a requested one.
        if active_live && state.atomic_number(active) > 0 {
            return vec![active];
        }

        if state.conf().directed_interleavings {
            let next = state
                .requested_switch()
                .filter(|tid| live.contains(tid))
                .or(if active_live { Some(active) } else { None })
                .or_else(|| live.first().copied());
            return next.into_iter().collect();
        }

        // The active thread ended, switching is forced and the bound does not apply.
        if !active_live {
            return live.to_vec();
        }

        if state.check_if_ileaves_blocked() {
            return vec![active];
        }

        // Continuing the active thread is not a reordering, MPOR only filters switches.
        live.iter()
            .copied()
            .filter(|tid| {
                (*tid == active || state.is_thread_mpor_schedulable(*tid))
                    && state.dfs_explore_thread(*tid)
            })
            .collect()
    }

    fn leaf(&mut self, state: ExecutionState) -> Res<()> {
        self.report.interleavings += 1;
        debug!(
            "interleaving #{} complete after {} context switch(es)",
            self.report.interleavings,
            state.cs_number()
        );
        self.settle(state)
    }

    /// Accounts for the claims of a state exploration stops at, runs the leaf callback.
    fn settle(&mut self, mut state: ExecutionState) -> Res<()> {
        let claims = state.claims();
        self.report.claims.total += claims.total;
        self.report.claims.remaining += claims.remaining;
        if let Some(on_leaf) = self.on_leaf.as_mut() {
            on_leaf(&mut state)?
        }
        Ok(())
    }
}
