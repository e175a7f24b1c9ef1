//! Tests over execution states.

crate::prelude!();

use program::{Kind, Program};
use state::{Claims, ExecutionState, Status};
use target::{Equation, Step};

fn new_state(program: Program, conf: Conf) -> ExecutionState {
    ExecutionState::new(Rc::new(program), Rc::new(conf), Box::new(Equation::new())).unwrap()
}

fn g() -> Symbol {
    Symbol::new("g", Typ::Int)
}

fn assign_g(val: i32) -> Kind {
    Kind::Assign {
        lhs: Expr::sym(g()),
        rhs: val.into(),
    }
}

fn assignments(state: &ExecutionState) -> Vec<(String, Expr)> {
    state
        .steps()
        .into_iter()
        .filter_map(|step| match step {
            Step::Assignment { lhs, rhs, .. } => Some((lhs.id().to_string(), rhs)),
            Step::Assumption { .. } | Step::Assertion { .. } => None,
        })
        .collect()
}

#[test]
fn unknown_entry_point() {
    let program = Program::new().function("main", vec![], vec![Kind::Skip]);
    let res = ExecutionState::new(
        Rc::new(program),
        Rc::new(Conf::new().entry_point("start")),
        Box::new(Equation::new()),
    );
    match res.map(|_| ()).unwrap_err().kind() {
        ErrorKind::NoEntryPoint(name) => assert_eq!(name, "start"),
        kind => panic!("unexpected error {}", kind),
    }
}

#[test]
fn node_counters_start_at_one() {
    let counter = state::NodeCounter::default();
    assert_eq!(counter.peek(), 1);
    assert_eq!(counter.next(), 1);
    assert_eq!(counter.clone().next(), 2);
    assert_eq!(counter.next(), 3);
}

#[test]
fn jumps_out_of_functions() {
    let program = Program::new()
        .function("main", vec![], vec![Kind::Skip])
        .function(
            "f",
            vec![],
            vec![Kind::Goto {
                cond: true.into(),
                target: 7,
            }],
        );
    let res = ExecutionState::new(
        Rc::new(program),
        Rc::new(Conf::new()),
        Box::new(Equation::new()),
    );
    assert_eq!(
        res.map(|_| ()).unwrap_err().to_string(),
        "goto at `f`:0 targets 7, but `f` has 2 instruction(s)"
    );
}

#[test]
fn single_thread() {
    let program = Program::new().global(&g()).function(
        "main",
        vec![],
        vec![
            assign_g(1),
            Kind::Assert {
                cond: build_expr!((= (g: int) 1)),
                msg: "g is 1".into(),
            },
        ],
    );
    let mut state = new_state(program, Conf::new());
    assert_eq!(state.node_id(), 1);

    state.symex_step().unwrap();
    // Single-threaded accesses are not switch points.
    assert!(!state.has_cswitch_point_occured());
    state.symex_step().unwrap();
    assert_eq!(
        state.claims(),
        Claims {
            total: 1,
            remaining: 0
        }
    );
    assert!(state.can_execution_continue());

    state.symex_step().unwrap();
    assert!(!state.can_execution_continue());
    assert_eq!(state.status(0), Status::Ended);
    assert!(state.cswitch_forced());
    assert!(state.has_cswitch_point_occured());

    assert_eq!(
        state.steps(),
        vec![Step::Assignment {
            guard: true.into(),
            lhs: Symbol::new("g&1#1", Typ::Int),
            rhs: 1.into(),
            source: Source::new("main", 0, 0),
        }]
    );

    let err = state.symex_step().unwrap_err();
    assert_eq!(err.to_string(), "cannot step thread 0: it has ended");
}

#[test]
fn clones_are_isolated() {
    let program = Program::new()
        .global(&g())
        .function("main", vec![], vec![assign_g(1), assign_g(2)]);
    let mut state = new_state(program, Conf::new());
    state.symex_step().unwrap();

    let mut child = state.try_clone().unwrap();
    child.symex_step().unwrap();

    assert_eq!(state.level2().value_of("g", &Typ::Int), Expr::from(1));
    assert_eq!(child.level2().value_of("g", &Typ::Int), Expr::from(2));
    assert_eq!(state.active().pc, Loc::new("main", 1));
    assert_eq!(child.active().pc, Loc::new("main", 2));
    assert_eq!(state.steps().len(), 1);
    assert_eq!(child.steps().len(), 2);

    // Node ids are never handed out twice.
    child.commit_transition(0).unwrap();
    assert_eq!(child.node_id(), 2);
    state.commit_transition(0).unwrap();
    assert_eq!(state.node_id(), 3);
}

#[test]
fn incremental_clones_share_the_sink() {
    let program = Program::new()
        .global(&g())
        .function("main", vec![], vec![assign_g(1), assign_g(2)]);
    let mut state = new_state(program, Conf::new().smt_during_symex(true));
    state.symex_step().unwrap();
    {
        let mut child = state.try_clone().unwrap();
        child.symex_step().unwrap();
        assert_eq!(state.steps().len(), 2);
    }
    assert_eq!(state.steps().len(), 1);
}

#[test]
fn schedule_claims_are_aggregated() {
    let program = Program::new().global(&g()).function(
        "main",
        vec![],
        vec![Kind::Assert {
            cond: build_expr!((> (g: int) 0)),
            msg: "g is positive".into(),
        }],
    );
    let owned = new_state(program.clone(), Conf::new());
    assert_eq!(owned.total_claims(), None);

    let mut state = new_state(program, Conf::new().schedule(true));
    let mut child = state.try_clone().unwrap();
    state.symex_step().unwrap();
    child.symex_step().unwrap();

    let one = Claims {
        total: 1,
        remaining: 1,
    };
    assert_eq!(state.claims(), one);
    assert_eq!(child.claims(), one);
    assert_eq!(
        state.total_claims(),
        Some(Claims {
            total: 2,
            remaining: 2
        })
    );
}

#[test]
fn unknown_functions() {
    let program =
        Program::new().function("main", vec![], vec![Kind::StartThread("worker".into())]);
    let mut state = new_state(program, Conf::new());
    match state.symex_step().unwrap_err().kind() {
        ErrorKind::UnknownFunction(name) => assert_eq!(name, "worker"),
        kind => panic!("unexpected error {}", kind),
    }

    let program = Program::new().function(
        "main",
        vec![],
        vec![Kind::Call {
            lhs: None,
            function: "f".into(),
            args: vec![],
        }],
    );
    let mut state = new_state(program, Conf::new());
    match state.symex_step().unwrap_err().kind() {
        ErrorKind::UnknownFunction(name) => assert_eq!(name, "f"),
        kind => panic!("unexpected error {}", kind),
    }
}

#[test]
fn calls() {
    let n = Symbol::new("n", Typ::Int);
    let r = Symbol::new("r", Typ::Int);
    let program = Program::new()
        .function(
            "main",
            vec![],
            vec![
                Kind::Decl(r.clone()),
                Kind::Call {
                    lhs: Some(Expr::sym(r.clone())),
                    function: "inc".into(),
                    args: vec![5.into()],
                },
                Kind::Assert {
                    cond: build_expr!((= (r: int) 6)),
                    msg: "r is 6".into(),
                },
            ],
        )
        .function(
            "inc",
            vec![n.clone()],
            vec![
                Kind::Return(Some(build_expr!((+ (n: int) 1)))),
                // Dead code.
                Kind::Assign {
                    lhs: Expr::sym(n),
                    rhs: 0.into(),
                },
            ],
        );
    let mut state = new_state(program, Conf::new());

    state.symex_step().unwrap();
    state.symex_step().unwrap();
    assert_eq!(state.active().call_stack.len(), 2);
    assert_eq!(state.active().pc, Loc::new("inc", 0));
    assert_eq!(
        state.active().top().calling_location,
        Some(Loc::new("main", 2))
    );

    let mut trace = vec![];
    state.print_stack_traces(&mut trace, 0).unwrap();
    assert_eq!(
        String::from_utf8(trace).unwrap(),
        "Thread 0 *:\n  inc at inc:0\n  main at main:2\n"
    );

    // Return, then skipping the dead assignment.
    state.symex_step().unwrap();
    assert!(state.active().guard.is_false());
    state.symex_step().unwrap();
    // Merge at the end of `inc`, then back to `main`.
    state.symex_step().unwrap();
    assert!(state.active().guard.is_true());
    assert_eq!(state.active().pc, Loc::new("main", 2));
    assert_eq!(state.active().call_stack.len(), 1);

    state.symex_step().unwrap();
    assert_eq!(
        state.claims(),
        Claims {
            total: 1,
            remaining: 0
        }
    );
    assert_eq!(
        assignments(&state),
        vec![
            ("n@1!0&1#1".to_string(), Expr::from(5)),
            ("r@1!0&1#1".to_string(), Expr::from(6)),
        ]
    );
}

#[test]
fn call_arity() {
    let program = Program::new()
        .function(
            "main",
            vec![],
            vec![Kind::Call {
                lhs: None,
                function: "f".into(),
                args: vec![],
            }],
        )
        .function("f", vec![Symbol::new("n", Typ::Int)], vec![Kind::Skip]);
    let mut state = new_state(program, Conf::new());
    let err = state.symex_step().unwrap_err();
    assert_eq!(err.to_string(), "`f` expects 1 argument(s), called with 0");
}

#[test]
fn branches_merge_with_phis() {
    let c = build_expr!((c: bool));
    let program = Program::new().global(&g()).function(
        "main",
        vec![],
        vec![
            Kind::Goto { cond: c, target: 3 },
            assign_g(1),
            Kind::Goto {
                cond: true.into(),
                target: 4,
            },
            assign_g(2),
            Kind::Assert {
                cond: build_expr!((> (g: int) 0)),
                msg: "g is positive".into(),
            },
        ],
    );
    let mut state = new_state(program, Conf::new());
    let c = Expr::sym(Symbol::new("c&0#0", Typ::Bool));
    let not_c = Expr::not(c.clone());

    state.symex_step().unwrap();
    assert_eq!(state.active().guard.conjuncts(), &[not_c.clone()]);
    assert_eq!(state.active().pc.index, 1);

    state.symex_step().unwrap();
    state.symex_step().unwrap();
    assert!(state.active().guard.is_false());
    assert_eq!(state.active().pc.index, 3);

    // The jump target is reached under `c`.
    state.symex_step().unwrap();
    assert_eq!(state.active().guard.conjuncts(), &[c.clone()]);

    state.symex_step().unwrap();
    assert_eq!(
        state.active().guard.conjuncts(),
        &[Expr::or(vec![c.clone(), not_c.clone()])]
    );
    assert_eq!(
        assignments(&state),
        vec![
            ("g&1#1".to_string(), Expr::from(1)),
            ("g&1#2".to_string(), Expr::from(2)),
            (
                "g&1#3".to_string(),
                Expr::ite(not_c, Expr::from(1), Expr::from(2))
            ),
        ]
    );
    // The merged value is not a constant anymore.
    assert_eq!(
        state.claims(),
        Claims {
            total: 1,
            remaining: 1
        }
    );
    assert_eq!(state.level2().original_name("g&1#3"), "g");
}

#[test]
fn loops_are_unwound() {
    let c = build_expr!((c: bool));
    let program = Program::new().function(
        "main",
        vec![],
        vec![Kind::Skip, Kind::Goto { cond: c, target: 0 }],
    );
    let mut state = new_state(program, Conf::new().unwind(2));
    while state.can_execution_continue() {
        state.symex_step().unwrap()
    }

    let not_c = Expr::not(Expr::sym(Symbol::new("c&0#0", Typ::Bool)));
    let assumptions: Vec<Expr> = state
        .steps()
        .into_iter()
        .filter_map(|step| match step {
            Step::Assumption { fact, .. } => Some(fact),
            Step::Assignment { .. } | Step::Assertion { .. } => None,
        })
        .collect();
    assert_eq!(assumptions, vec![not_c]);
    assert_eq!(state.status(0), Status::Ended);
}

#[test]
fn nested_loops_unwind_on_every_entry() {
    let program = Program::new().function(
        "main",
        vec![],
        vec![
            Kind::Skip,
            Kind::Assert {
                cond: build_expr!((d: bool)),
                msg: "inner body".into(),
            },
            Kind::Goto {
                cond: build_expr!((d: bool)),
                target: 1,
            },
            Kind::Goto {
                cond: build_expr!((c: bool)),
                target: 0,
            },
        ],
    );
    let mut state = new_state(program, Conf::new().unwind(1));
    while state.can_execution_continue() {
        state.symex_step().unwrap()
    }
    // Two entries in the inner loop, each running its body twice.
    assert_eq!(state.claims().total, 4);
    assert!(state.thread(0).top().loop_iterations.is_empty());
}

#[test]
fn accesses_and_mpor() {
    let x = Symbol::new("x", Typ::Int);
    let program = Program::new()
        .global(&g())
        .function(
            "main",
            vec![],
            vec![Kind::StartThread("worker".into()), assign_g(1)],
        )
        .function(
            "worker",
            vec![],
            vec![
                Kind::Decl(x.clone()),
                Kind::Assign {
                    lhs: Expr::sym(x.clone()),
                    rhs: 3.into(),
                },
                Kind::Assign {
                    lhs: Expr::sym(x),
                    rhs: Expr::sym(g()),
                },
            ],
        );
    let mut state = new_state(program, Conf::new());

    state.symex_step().unwrap();
    assert_eq!(state.thread_count(), 2);
    assert!(!state.has_cswitch_point_occured());
    state.symex_step().unwrap();
    assert!(state.has_cswitch_point_occured());
    assert!(state.mpor().last_writes(0).contains("g"));
    state.calculate_mpor_constraints();

    state.commit_transition(1).unwrap();
    assert_eq!(state.active_thread(), 1);
    assert_eq!(state.last_active_thread(), 0);
    assert_eq!(state.cs_number(), 1);

    // Locals are not accesses.
    state.symex_step().unwrap();
    state.symex_step().unwrap();
    assert!(!state.has_cswitch_point_occured());

    state.symex_step().unwrap();
    assert!(state.has_cswitch_point_occured());
    assert!(state.mpor().last_reads(1).contains("g"));
    assert!(state.check_mpor_dependancy(1, 0));
    state.calculate_mpor_constraints();
    assert!(!state.is_thread_mpor_schedulable(0));
    assert!(state.is_thread_mpor_schedulable(1));
}

#[test]
fn atomic_sections() {
    let program = Program::new()
        .global(&g())
        .function(
            "main",
            vec![],
            vec![
                Kind::StartThread("worker".into()),
                Kind::AtomicBegin,
                assign_g(1),
                Kind::AtomicEnd,
            ],
        )
        .function("worker", vec![], vec![Kind::Skip]);
    let mut state = new_state(program, Conf::new());

    for _ in 0..3 {
        state.symex_step().unwrap()
    }
    assert_eq!(state.status(0), Status::Atomic);
    assert_eq!(state.atomic_number(0), 1);
    assert!(state.has_cswitch_point_occured());
    assert!(state.check_if_ileaves_blocked());

    state.commit_transition(0).unwrap();
    state.symex_step().unwrap();
    assert_eq!(state.status(0), Status::Running);
    assert!(state.cswitch_forced());
    assert!(!state.check_if_ileaves_blocked());
}

#[test]
fn blocked_interleavings() {
    let program = Program::new()
        .function("main", vec![], vec![Kind::StartThread("worker".into())])
        .function("worker", vec![], vec![Kind::Skip]);

    let mut state = new_state(program.clone(), Conf::new().context_switch_bound(1));
    // A single thread.
    assert!(state.check_if_ileaves_blocked());
    state.symex_step().unwrap();
    assert!(!state.check_if_ileaves_blocked());
    state.commit_transition(1).unwrap();
    assert!(state.check_if_ileaves_blocked());

    let mut state = new_state(program, Conf::new().directed_interleavings(true));
    state.symex_step().unwrap();
    assert!(state.check_if_ileaves_blocked());
}

#[test]
fn switch_requests() {
    let program = Program::new()
        .function(
            "main",
            vec![],
            vec![Kind::StartThread("worker".into()), Kind::SwitchTo(1)],
        )
        .function("worker", vec![], vec![Kind::Skip]);
    let mut state = new_state(program, Conf::new().directed_interleavings(true));
    state.symex_step().unwrap();
    state.symex_step().unwrap();
    assert_eq!(state.requested_switch(), Some(1));
    assert!(state.cswitch_forced());

    state.commit_transition(1).unwrap();
    assert_eq!(state.requested_switch(), None);
    assert!(!state.cswitch_forced());
}

#[test]
fn dfs_traversal() {
    let program = Program::new()
        .function("main", vec![], vec![Kind::StartThread("worker".into())])
        .function("worker", vec![], vec![Kind::Skip]);
    let mut state = new_state(program, Conf::new());
    state.symex_step().unwrap();

    assert!(state.dfs_explore_thread(1));
    assert!(!state.dfs_explore_thread(1));
    assert!(state.dfs_explore_thread(0));
    state.reset_dfs_traversed();
    assert!(state.dfs_explore_thread(1));

    // Ended threads are never explored.
    state.symex_step().unwrap();
    state.reset_dfs_traversed();
    assert!(!state.dfs_explore_thread(0));
}

#[test]
fn guard_execution() {
    let program = Program::new()
        .function(
            "main",
            vec![],
            vec![
                Kind::StartThread("worker".into()),
                Kind::Goto {
                    cond: build_expr!((c: bool)),
                    target: 3,
                },
                Kind::Skip,
                Kind::Skip,
            ],
        )
        .function("worker", vec![], vec![Kind::Skip]);
    let mut state = new_state(program, Conf::new().smt_thread_guard(true));
    state.symex_step().unwrap();
    state.symex_step().unwrap();

    let not_c = Expr::not(Expr::sym(Symbol::new("c&0#0", Typ::Bool)));
    assert_eq!(state.thread(0).guard.conjuncts(), &[not_c.clone()]);
    // Spawned before the branch.
    assert!(state.thread(1).guard.is_true());

    state.commit_transition(1).unwrap();
    assert_eq!(state.node_id(), 2);
    let first = Expr::sym(Symbol::new("\\guard_exec@1!0&2#1", Typ::Bool));
    assert_eq!(
        state.thread(0).guard.conjuncts(),
        &[not_c.clone(), first.clone()]
    );
    assert_eq!(state.thread(1).guard.conjuncts(), &[first.clone()]);
    assert_eq!(
        state.steps().pop(),
        Some(Step::Assumption {
            guard: true.into(),
            fact: Expr::implies(first.clone(), not_c.clone()),
            source: Source::new("worker", 5, 1),
        })
    );
    // `Unknown` is not a refutation.
    assert!(!state.interleaving_unviable());

    state.commit_transition(0).unwrap();
    let second = Expr::sym(Symbol::new("\\guard_exec@2!0&3#1", Typ::Bool));
    assert_eq!(state.thread(0).guard.conjuncts(), &[not_c, second.clone()]);
    assert_eq!(state.thread(1).guard.conjuncts(), &[second]);
    assert_eq!(state.level2().original_name("\\guard_exec@2!0&3#1"), "\\guard_exec");
}

#[test]
fn false_guards() {
    let program = Program::new()
        .function(
            "main",
            vec![],
            vec![Kind::StartThread("worker".into()), Kind::Assume(false.into())],
        )
        .function("worker", vec![], vec![Kind::Skip]);

    let mut state = new_state(program.clone(), Conf::new());
    state.symex_step().unwrap();
    state.symex_step().unwrap();
    assert!(state.active().guard.is_false());
    let steps = state.steps().len();
    state.commit_transition(1).unwrap();
    // No guard symbol for a dead parent.
    assert_eq!(state.steps().len(), steps);
    assert!(state.thread(1).guard.is_false());
    assert!(state.is_cur_state_guard_false().unwrap());
    assert!(!state.interleaving_unviable());

    let mut state = new_state(program, Conf::new().smt_thread_guard(true));
    state.symex_step().unwrap();
    state.symex_step().unwrap();
    state.commit_transition(1).unwrap();
    assert!(state.interleaving_unviable());
}

#[test]
fn ended_threads_hash_differently() {
    let program = Program::new()
        .global(&g())
        .function("main", vec![], vec![Kind::StartThread("worker".into())])
        .function("worker", vec![], vec![Kind::Skip]);
    let mut state = new_state(program, Conf::new().state_hashing(true));
    state.symex_step().unwrap();
    let before = state.generate_hash();
    assert_eq!(before, state.try_clone().unwrap().generate_hash());

    state.symex_step().unwrap();
    assert_eq!(state.status(0), Status::Ended);
    assert_ne!(before, state.generate_hash());
}
