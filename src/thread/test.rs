//! Tests over guards and thread states.

crate::prelude!();

use program::{Kind, Program};
use rename::{Flavor, Level2};
use thread::{Guard, ThreadState};

fn guard(conjuncts: Vec<Expr>) -> Guard {
    let mut guard = Guard::new();
    for conj in conjuncts {
        guard.add(conj)
    }
    guard
}

#[test]
fn guard_add() {
    let (a, b) = (build_expr!((a: bool)), build_expr!((b: bool)));

    let mut g = Guard::new();
    assert!(g.is_true());
    assert_eq!(g.as_expr(), Expr::from(true));

    g.add(build_expr!((and (a: bool) (b: bool))));
    assert_eq!(g.conjuncts(), &[a.clone(), b.clone()]);

    g.add(true.into());
    g.add(a.clone());
    assert_eq!(g.conjuncts(), &[a, b]);

    g.add(false.into());
    assert!(g.is_false());
    assert_eq!(g.conjuncts().len(), 1);

    // Nothing gets past `false`.
    g.add(build_expr!((c: bool)));
    assert_eq!(g.as_expr(), Expr::from(false));
}

#[test]
fn guard_merge() {
    let (p, a, b) = (
        build_expr!((p: bool)),
        build_expr!((a: bool)),
        build_expr!((b: bool)),
    );

    let mut lft = guard(vec![p.clone(), a.clone()]);
    let rgt = guard(vec![p.clone(), b.clone()]);
    lft.merge(&rgt);
    assert_eq!(lft.conjuncts(), &[p.clone(), Expr::or(vec![a, b.clone()])]);

    // One of the rests is empty, the disjunction is `true`.
    let mut lft = guard(vec![p.clone()]);
    lft.merge(&guard(vec![p.clone(), b.clone()]));
    assert_eq!(lft.conjuncts(), &[p.clone()]);

    let mut dead = Guard::new();
    dead.make_false();
    dead.merge(&rgt);
    assert_eq!(dead, rgt);

    let mut dead = Guard::new();
    dead.make_false();
    let mut live = rgt.clone();
    live.merge(&dead);
    assert_eq!(live, rgt);
}

#[test]
fn guard_remove_prefix() {
    let (p, q, a) = (
        build_expr!((p: bool)),
        build_expr!((q: bool)),
        build_expr!((a: bool)),
    );
    let mut g = guard(vec![p.clone(), q.clone(), a.clone()]);
    g.remove_prefix(&guard(vec![p.clone(), q.clone()]));
    assert_eq!(g.conjuncts(), &[a.clone()]);

    let mut g = guard(vec![p.clone(), a.clone()]);
    g.remove_prefix(&guard(vec![q]));
    assert_eq!(g.conjuncts(), &[p, a]);
}

#[test]
fn guard_replace() {
    let (old, new, a) = (
        build_expr!((old: bool)),
        build_expr!((new: bool)),
        build_expr!((a: bool)),
    );
    let mut g = guard(vec![old.clone(), a.clone()]);
    g.replace(Some(&old), new.clone());
    assert_eq!(g.conjuncts(), &[a.clone(), new.clone()]);

    let mut g = guard(vec![a.clone()]);
    g.replace(None, new.clone());
    assert_eq!(g.conjuncts(), &[a.clone(), new]);

    g.replace(None, false.into());
    assert!(g.is_false());
}

#[test]
fn declarations() {
    let mut level2 = Level2::new(Flavor::Plain, conf::DEFAULT_WITH_DEPTH);
    let mut thread = ThreadState::new(1, "worker");

    assert_eq!(thread.declare("x", &mut level2), "x@1!1");
    assert_eq!(thread.declare("x", &mut level2), "x@2!1");
    assert_eq!(thread.declare("y", &mut level2), "y@1!1");

    assert_eq!(level2.original_name("x@2!1"), "x");
    assert_eq!(thread.top().level1.identifier("x"), "x@2!1");
    assert!(thread.top().level1.is_local("y"));
    assert!(!thread.top().level1.is_local("g"));
}

#[test]
fn lifecycle() {
    let program = Program::new().function("worker", vec![], vec![Kind::Skip]);
    let mut thread = ThreadState::new(0, "worker");

    assert!(thread.can_continue());
    assert_eq!(thread.location_number(&program), Some(0));
    thread.pc.index += 1;
    assert_eq!(thread.location_number(&program), Some(1));

    thread.ended = true;
    assert!(!thread.can_continue());

    let mut thread = ThreadState::new(0, "worker");
    let _ = thread.call_stack.pop();
    assert!(!thread.can_continue());
    assert_eq!(thread.location_number(&program), None);
}
