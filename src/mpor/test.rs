//! Tests over the MPOR dependency engine.

use proptest::{collection::btree_set, prelude::*};

crate::prelude!();

use mpor::{Mpor, DEP, NOT_RUN, NO_DEP};

fn two_threads() -> Mpor {
    let mut mpor = Mpor::new();
    mpor.add_thread();
    mpor
}

#[test]
fn add_thread() {
    let mut mpor = Mpor::new();
    assert_eq!(mpor.len(), 1);
    mpor.add_thread();
    mpor.add_thread();
    assert_eq!(mpor.len(), 3);
    for row in mpor.dependency_chain() {
        assert_eq!(row, &[NOT_RUN, NOT_RUN, NOT_RUN]);
    }
    assert_eq!(mpor.schedulable(), &[true, true, true]);
}

#[test]
fn write_then_read() {
    let mut mpor = two_threads();

    mpor.record_write(0, "g");
    mpor.calculate_mpor_constraints(0);
    assert_eq!(mpor.dependency_chain(), &[vec![DEP, NO_DEP], vec![NOT_RUN, NOT_RUN]]);
    assert_eq!(mpor.schedulable(), &[true, true]);

    mpor.record_read(1, "g");
    assert!(mpor.check_mpor_dependancy(1, 0));
    mpor.calculate_mpor_constraints(1);

    assert_eq!(mpor.dep(0, 1), DEP);
    assert_eq!(mpor.dep(1, 1), DEP);
    assert_eq!(mpor.dep(1, 0), NO_DEP);
    // Running thread 0 after thread 1 is redundant.
    assert!(!mpor.is_schedulable(0));
    assert!(mpor.is_schedulable(1));
}

#[test]
fn independent_writes() {
    let mut mpor = two_threads();

    mpor.record_write(0, "g");
    mpor.calculate_mpor_constraints(0);
    mpor.record_write(1, "h");
    assert!(!mpor.check_mpor_dependancy(0, 1));
    mpor.calculate_mpor_constraints(1);

    assert_eq!(mpor.dependency_chain(), &[vec![DEP, NO_DEP], vec![NO_DEP, DEP]]);
    assert!(!mpor.is_schedulable(0));
    assert!(mpor.is_schedulable(1));
}

#[test]
fn read_read() {
    let mut mpor = two_threads();
    mpor.record_read(0, "g");
    mpor.record_read(1, "g");
    assert!(!mpor.check_mpor_dependancy(0, 1));
    assert!(!mpor.check_mpor_dependancy(1, 0));
}

#[test]
fn write_write() {
    let mut mpor = two_threads();
    mpor.record_write(0, "g");
    mpor.record_write(1, "g");
    assert!(mpor.check_mpor_dependancy(0, 1));
}

#[test]
fn accesses() {
    let mut mpor = two_threads();
    assert!(!mpor.has_accesses(1));
    mpor.record_read(1, "g");
    assert!(mpor.has_accesses(1));
    assert!(mpor.last_reads(1).contains("g"));
    assert!(mpor.last_writes(1).is_empty());
    mpor.clear_accesses(1);
    assert!(!mpor.has_accesses(1));
}

fn accesses_strategy() -> impl Strategy<Value = std::collections::BTreeSet<String>> {
    btree_set("[a-d]", 0..4)
}

proptest! {
    #[test]
    fn dependency_is_symmetric(
        reads_0 in accesses_strategy(),
        writes_0 in accesses_strategy(),
        reads_1 in accesses_strategy(),
        writes_1 in accesses_strategy(),
    ) {
        let mut mpor = two_threads();
        for id in reads_0 { mpor.record_read(0, id) }
        for id in writes_0 { mpor.record_write(0, id) }
        for id in reads_1 { mpor.record_read(1, id) }
        for id in writes_1 { mpor.record_write(1, id) }
        prop_assert_eq!(mpor.check_mpor_dependancy(0, 1), mpor.check_mpor_dependancy(1, 0));
    }

    #[test]
    fn diagonal_is_dependent(
        steps in proptest::collection::vec((0..3usize, accesses_strategy(), accesses_strategy()), 1..8),
    ) {
        let mut mpor = Mpor::new();
        mpor.add_thread();
        mpor.add_thread();
        for (active, reads, writes) in steps {
            mpor.clear_accesses(active);
            for id in reads { mpor.record_read(active, id) }
            for id in writes { mpor.record_write(active, id) }
            mpor.calculate_mpor_constraints(active);
            prop_assert_eq!(mpor.dep(active, active), DEP);
            for (col, entry) in mpor.dependency_chain()[active].iter().enumerate() {
                if col != active {
                    prop_assert_eq!(*entry, NO_DEP);
                }
            }
        }
    }
}
