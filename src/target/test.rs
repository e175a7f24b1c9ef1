//! Tests over targets and sinks.

crate::prelude!();

use conf::Strategy;
use target::{Equation, Sink, Step, Target, Tv};

fn source() -> Source {
    Source::new("main", 0, 0)
}

fn assume(target: &mut dyn Target, fact: Expr) {
    target
        .assumption(&Expr::from(true), &fact, &source())
        .unwrap()
}

#[test]
fn equation_contexts() {
    let mut eq = Equation::new();
    assume(&mut eq, build_expr!((a: bool)));
    eq.push_ctx().unwrap();
    assume(&mut eq, build_expr!((b: bool)));
    eq.push_ctx().unwrap();
    assume(&mut eq, build_expr!((c: bool)));
    assert_eq!(eq.depth(), 2);
    assert_eq!(eq.steps().len(), 3);

    eq.pop_ctx().unwrap();
    assert_eq!(eq.steps().len(), 2);
    eq.pop_ctx().unwrap();
    assert_eq!(eq.steps().len(), 1);

    let err = eq.pop_ctx().unwrap_err();
    assert_eq!(err.to_string(), "cannot pop context: no context is open");
}

#[test]
fn equation_questions() {
    let mut eq = Equation::new();
    let q = build_expr!((or (a: bool) true));
    assert_eq!(eq.ask_solver_question(&q).unwrap(), Tv::True);
    let q = build_expr!((and (a: bool) false));
    assert_eq!(eq.ask_solver_question(&q).unwrap(), Tv::False);
    let q = build_expr!((a: bool));
    assert_eq!(eq.ask_solver_question(&q).unwrap(), Tv::Unknown);
}

#[test]
fn steps() {
    let guard = build_expr!((g: bool));
    let x = Symbol::new("x&1#1", Typ::Int);
    let step = Step::Assignment {
        guard: guard.clone(),
        lhs: x.clone(),
        rhs: 3.into(),
        source: source(),
    };
    assert_eq!(
        step.to_expr(),
        Expr::implies(guard.clone(), Expr::eq(Expr::sym(x), 3.into()))
    );
    assert!(!step.is_assertion());
    assert_eq!(step.to_string(), "g => x&1#1 := 3");

    let step = Step::Assertion {
        guard: guard.clone(),
        cond: build_expr!((c: bool)),
        msg: "c holds".into(),
        source: source(),
    };
    assert!(step.is_assertion());
    assert_eq!(step.to_string(), "g => assert c // c holds");
}

#[test]
fn owned_sinks_are_independent() {
    let mut root = Sink::new(Box::new(Equation::new()), Strategy::Owned);
    root.with(|t| t.assumption(&true.into(), &build_expr!((a: bool)), &source()))
        .unwrap();

    let mut child = root.fork(Strategy::Owned).unwrap();
    child
        .with(|t| t.assumption(&true.into(), &build_expr!((b: bool)), &source()))
        .unwrap();

    assert_eq!(root.steps().len(), 1);
    assert_eq!(child.steps().len(), 2);
}

#[test]
fn incremental_sinks_pop_on_drop() {
    let mut root = Sink::new(Box::new(Equation::new()), Strategy::Incremental);
    root.with(|t| t.assumption(&true.into(), &build_expr!((a: bool)), &source()))
        .unwrap();

    {
        let mut child = root.fork(Strategy::Incremental).unwrap();
        child
            .with(|t| t.assumption(&true.into(), &build_expr!((b: bool)), &source()))
            .unwrap();
        assert_eq!(root.steps().len(), 2);
    }
    assert_eq!(root.steps().len(), 1);
}

#[test]
fn schedule_sinks_share() {
    let mut root = Sink::new(Box::new(Equation::new()), Strategy::Schedule);
    {
        let mut child = root.fork(Strategy::Schedule).unwrap();
        child
            .with(|t| t.assumption(&true.into(), &build_expr!((b: bool)), &source()))
            .unwrap();
    }
    root.with(|t| t.assumption(&true.into(), &build_expr!((a: bool)), &source()))
        .unwrap();
    assert_eq!(root.steps().len(), 2);
}
