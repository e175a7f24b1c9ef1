//! Tests over expressions.

crate::prelude!();

use rsmt2::print::Expr2Smt;

fn smt_string(expr: &Expr) -> String {
    let mut buff = vec![];
    expr.expr_to_smt2(&mut buff, ()).unwrap();
    String::from_utf8_lossy(&buff).into_owned()
}

#[test]
fn typing_implies() {
    let lft = build_expr!((a: bool));
    let rgt = build_expr!((> (n: int) 7));

    let typ = expr::Op::Implies.type_check(&[lft, rgt]).unwrap();

    assert_eq!(typ, expr::Typ::Bool);
}

#[test]
fn typing_ite() {
    let cnd = build_expr!((a: bool));
    let thn = build_expr!((+ (n_1: int) 2));
    let els = build_expr!((- (n_2: int) 10));

    let typ = expr::Op::Ite.type_check(&[cnd, thn, els]).unwrap();

    assert_eq!(typ, expr::Typ::Int);
}

#[test]
fn typing_ite_fail() {
    let cnd = build_expr!((a: int));
    let thn = build_expr!((+ (n_1: int) 2));
    let els = build_expr!((- (n_2: int) 10));

    let err = expr::Op::Ite.type_check(&[cnd, thn, els]).unwrap_err();

    assert_eq!(
        err.to_string(),
        "expected first argument of type `bool`, got `int`",
    );

    let cnd = build_expr!((a: bool));
    let thn = build_expr!((and (b: bool) true));
    let els = build_expr!((n: int));

    let err = expr::Op::Ite.type_check(&[cnd, thn, els]).unwrap_err();

    assert_eq!(
        err.to_string(),
        "`ite`'s second and third arguments should have the same type, got `bool` and `int`",
    );
}

#[test]
fn typing_index_and_addr() {
    let arr = Expr::sym(Symbol::new("arr", Typ::array(Typ::Int)));
    let cell = Expr::index(arr, build_expr!(3));
    assert_eq!(cell.typ(), Typ::Int);
    assert_eq!(Expr::addr_of(cell).typ(), Typ::pointer(Typ::Int));
}

#[test]
fn simplify_bool() {
    let e = build_expr!((and true (a: bool) (and (b: bool) true))).simplify();
    assert_eq!(e.to_string(), "(and a b)");

    let e = build_expr!((or (a: bool) (and false (b: bool)))).simplify();
    assert_eq!(e.to_string(), "a");

    let e = build_expr!((=> false (a: bool))).simplify();
    assert!(e.is_true());

    let e = build_expr!((not (not (a: bool)))).simplify();
    assert_eq!(e.to_string(), "a");

    let e = build_expr!((= true (a: bool))).simplify();
    assert_eq!(e.to_string(), "a");

    let e = build_expr!((= 7 (+ 3 4))).simplify();
    assert!(e.is_true());
}

#[test]
fn simplify_ite() {
    let e = build_expr!((ite (> 2 (n: int)) (m: int) (m: int))).simplify();
    assert_eq!(e.to_string(), "m");

    let e = build_expr!((ite (not true) 1 (n: int))).simplify();
    assert_eq!(e.to_string(), "n");
}

#[test]
fn smt_printing() {
    let e = build_expr!((=> (a: bool) (>= (n: int) (- 3))));
    assert_eq!(smt_string(&e.simplify()), "(=> |a| (>= |n| (- 3)))");

    let arr = Expr::sym(Symbol::new("arr@0!1", Typ::array(Typ::Int)));
    let upd = Expr::with(arr.clone(), build_expr!(0), build_expr!(7));
    assert_eq!(smt_string(&upd), "(store |arr@0!1| 0 7)");
    assert_eq!(
        smt_string(&Expr::index(arr, build_expr!(2))),
        "(select |arr@0!1| 2)"
    );

    let guard = Expr::sym(Symbol::new("\\guard_exec@0!0&1#1", Typ::Bool));
    assert_eq!(smt_string(&guard), "|$guard_exec@0!0&1#1|");

    assert_eq!(smt_string(&Expr::and(vec![])), "true");
}

#[test]
fn smt_printing_fail() {
    let e = Expr::addr_of(build_expr!((g: int)));
    let mut buff = vec![];
    assert!(e.expr_to_smt2(&mut buff, ()).is_err());
}
