//! Monotonic partial-order reduction.
//!
//! Two transitions are *dependent* if one writes something the other reads or writes. Read/read
//! overlaps never create a dependency: the memory model is sequential consistency.
//!
//! The dependency matrix `dc` is square over thread ids. After thread `a` takes a transition,
//! `dc[j][a]` is
//!
//! - `0` if thread `j` has not taken a transition yet,
//! - `-1` if no dependency was established since `j`'s last transition,
//! - `1` if there is one.
//!
//! Schedulability follows: running thread `i` after a higher thread `j` is only worth exploring
//! if `j` has not run, or if a dependency chain through some `l < i` justifies the order.

crate::prelude!();

#[cfg(test)]
mod test;

/// Dependency matrix entry: the row thread has not taken a transition.
pub const NOT_RUN: i8 = 0;
/// Dependency matrix entry: no dependency.
pub const NO_DEP: i8 = -1;
/// Dependency matrix entry: dependency.
pub const DEP: i8 = 1;

/// MPOR bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mpor {
    /// Dependency matrix.
    dependency_chain: Vec<Vec<i8>>,
    /// Schedulability of each thread.
    schedulable: Vec<bool>,
    /// Globals read by the last transition of each thread, by original identifier.
    last_reads: Vec<Set<String>>,
    /// Globals written by the last transition of each thread, by original identifier.
    last_writes: Vec<Set<String>>,
}
impl Default for Mpor {
    fn default() -> Self {
        Self::new()
    }
}
impl Mpor {
    /// Bookkeeping for a single thread.
    pub fn new() -> Self {
        Self {
            dependency_chain: vec![vec![NOT_RUN]],
            schedulable: vec![true],
            last_reads: vec![Set::new()],
            last_writes: vec![Set::new()],
        }
    }

    /// Number of threads.
    pub fn len(&self) -> usize {
        self.schedulable.len()
    }
    /// Always false, there is at least one thread.
    pub fn is_empty(&self) -> bool {
        self.schedulable.is_empty()
    }

    /// Registers a new thread.
    ///
    /// It has the highest id, and is therefore schedulable.
    pub fn add_thread(&mut self) {
        for row in self.dependency_chain.iter_mut() {
            row.push(NOT_RUN)
        }
        let len = self.dependency_chain.len() + 1;
        self.dependency_chain.push(vec![NOT_RUN; len]);
        self.schedulable.push(true);
        self.last_reads.push(Set::new());
        self.last_writes.push(Set::new());
    }

    /// Dependency matrix.
    pub fn dependency_chain(&self) -> &[Vec<i8>] {
        &self.dependency_chain
    }
    /// Dependency matrix entry.
    pub fn dep(&self, row: ThreadId, col: ThreadId) -> i8 {
        self.dependency_chain[row][col]
    }

    /// Schedulability of a thread.
    ///
    /// # Panics
    ///
    /// - if `tid` is not a thread index.
    pub fn is_schedulable(&self, tid: ThreadId) -> bool {
        self.schedulable[tid]
    }
    /// Schedulability vector.
    pub fn schedulable(&self) -> &[bool] {
        &self.schedulable
    }

    /// Records a read of a global.
    pub fn record_read(&mut self, tid: ThreadId, id: impl Into<String>) {
        let _ = self.last_reads[tid].insert(id.into());
    }
    /// Records a write to a global.
    pub fn record_write(&mut self, tid: ThreadId, id: impl Into<String>) {
        let _ = self.last_writes[tid].insert(id.into());
    }
    /// Globals read by the last transition of a thread.
    pub fn last_reads(&self, tid: ThreadId) -> &Set<String> {
        &self.last_reads[tid]
    }
    /// Globals written by the last transition of a thread.
    pub fn last_writes(&self, tid: ThreadId) -> &Set<String> {
        &self.last_writes[tid]
    }
    /// True if the current transition of a thread accessed a global.
    pub fn has_accesses(&self, tid: ThreadId) -> bool {
        !self.last_reads[tid].is_empty() || !self.last_writes[tid].is_empty()
    }
    /// Forgets the accesses of a thread, called when it starts a new transition.
    pub fn clear_accesses(&mut self, tid: ThreadId) {
        self.last_reads[tid].clear();
        self.last_writes[tid].clear();
    }

    /// True if the last transitions of `j` and `l` are dependent.
    pub fn check_mpor_dependancy(&self, j: ThreadId, l: ThreadId) -> bool {
        let (reads_j, writes_j) = (&self.last_reads[j], &self.last_writes[j]);
        let (reads_l, writes_l) = (&self.last_reads[l], &self.last_writes[l]);
        // Write/write.
        if writes_j.intersection(writes_l).next().is_some() {
            return true;
        }
        // Read/write, both ways.
        reads_j.intersection(writes_l).next().is_some()
            || writes_j.intersection(reads_l).next().is_some()
    }

    /// Updates the dependency matrix and the schedulability vector after a transition of
    /// `active`.
    pub fn calculate_mpor_constraints(&mut self, active: ThreadId) {
        let len = self.len();
        let old = &self.dependency_chain;
        let mut new = old.clone();

        for entry in new[active].iter_mut() {
            *entry = NO_DEP
        }
        new[active][active] = DEP;

        for j in (0..len).filter(|j| *j != active) {
            if old[j][active] == NOT_RUN {
                new[j][active] = NOT_RUN;
            } else if (0..len).any(|l| old[j][l] == DEP && self.check_mpor_dependancy(active, l)) {
                new[j][active] = DEP;
            }
        }

        for i in 0..len {
            let can_run = (i + 1..len)
                .all(|j| new[j][i] != NO_DEP || (0..i).any(|l| old[j][l] == DEP));
            self.schedulable[i] = can_run;
        }

        self.dependency_chain = new;
    }
}
