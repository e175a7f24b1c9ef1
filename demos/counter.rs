//! Two threads incrementing a shared counter without synchronization.

use mt_symex::prelude::*;
use mt_symex::{
    explore::Explorer,
    program::{Kind, Program},
    state::ExecutionState,
    target::Equation,
};

fn increment(tmp: &Symbol, counter: &Symbol) -> Vec<Kind> {
    vec![
        Kind::Decl(tmp.clone()),
        Kind::Assign {
            lhs: Expr::sym(tmp.clone()),
            rhs: Expr::sym(counter.clone()),
        },
        Kind::Assign {
            lhs: Expr::sym(counter.clone()),
            rhs: Expr::from((Op::Add, vec![Expr::sym(tmp.clone()), 1.into()])),
        },
    ]
}

fn program() -> Program {
    let counter = Symbol::new("counter", Typ::Int);
    let tmp = Symbol::new("tmp", Typ::Int);

    let mut main = vec![
        Kind::Assign {
            lhs: Expr::sym(counter.clone()),
            rhs: 0.into(),
        },
        Kind::StartThread("worker".into()),
    ];
    main.extend(increment(&tmp, &counter));

    let mut worker = increment(&tmp, &counter);
    worker.push(Kind::Assert {
        cond: Expr::from((Op::Ge, vec![Expr::sym(counter.clone()), 1.into()])),
        msg: "counter was incremented".into(),
    });

    Program::new()
        .global(&counter)
        .function("main", vec![], main)
        .function("worker", vec![], worker)
}

fn run() {
    let conf = Conf::new().state_hashing(true);
    let state = match ExecutionState::new(
        Rc::new(program()),
        Rc::new(conf),
        Box::new(Equation::new()),
    ) {
        Ok(state) => state,
        Err(e) => {
            println!("error: {}", e);
            std::process::exit(2)
        }
    };

    let mut leaf = 0;
    let explorer = Explorer::new().on_leaf(|state| {
        leaf += 1;
        let status = if state.can_execution_continue() {
            "deduplicated"
        } else {
            "complete"
        };
        println!(
            "path #{} ({}): {} context switch(es), counter = {}",
            leaf,
            status,
            state.cs_number(),
            state.level2().value_of("counter", &Typ::Int)
        );
        for step in state.steps() {
            println!("  {}", step)
        }
        state.print_stack_traces(&mut std::io::stdout(), 2)
    });

    match explorer.explore(state) {
        Ok(report) => println!("{}", report),
        Err(e) => {
            for e in e.iter() {
                println!("- {}", e)
            }
            std::process::exit(2)
        }
    }
}

fn main() {
    run()
}

#[test]
fn test_counter() {
    run()
}
