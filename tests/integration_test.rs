//! End-to-end behavior through the public surface: `parse`, `evaluate` and
//! `render` against a fresh global environment.

use tinylisp::evaluator::create_global_env;
use tinylisp::{Environment, Error, Interpreter, Value, evaluate, parse, render};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run(source: &str, env: &Environment) -> Result<Value, Error> {
    evaluate(&parse(source)?, env)
}

/// Expected outcome: rendered output, or failure with a given error kind
enum Expect {
    Renders(&'static str),
    Syntax,
    Unbound,
    Invalid,
}
use Expect::*;

fn check_all(cases: &[(&str, Expect)]) {
    init_logging();
    let env = create_global_env();
    for (source, expected) in cases {
        let result = run(source, &env);
        match (expected, &result) {
            (Renders(text), Ok(value)) => assert_eq!(render(value), *text, "{source}"),
            (Syntax, Err(Error::Syntax(_)))
            | (Unbound, Err(Error::UnboundSymbol(_)))
            | (Invalid, Err(Error::InvalidProcedureInput(_))) => {}
            (Renders(text), _) => panic!("{source}: expected {text}, got {result:?}"),
            (_, _) => panic!("{source}: expected a failure, got {result:?}"),
        }
    }
}

#[test]
fn constants() {
    check_all(&[
        ("(pi)", Renders("3.141592653589793")),
        ("(π)", Renders("3.141592653589793")),
        ("(e)", Renders("2.718281828459045")),
        ("(𝑒)", Renders("2.718281828459045")),
        ("inf", Renders("inf")),
        ("(- 0.0 inf)", Renders("-inf")),
    ]);
}

#[test]
fn arithmetic_and_promotion() {
    check_all(&[
        ("(+ 2 2)", Renders("4")),
        ("(+ 2.0 2.0)", Renders("4.0")),
        ("(+ 2.0 2)", Renders("4.0")),
        ("(+ 2 2.0)", Renders("4.0")),
        ("(+ \"two\" \"two\")", Renders("twotwo")),
        ("(+ \"two\" 2)", Invalid),
        ("(+ two two)", Unbound),
        ("(- 4 2)", Renders("2")),
        ("(- 4.0 2)", Renders("2.0")),
        ("(- \"x\" \"y\")", Invalid),
        ("(* 2 2)", Renders("4")),
        ("(* 2.0 2)", Renders("4.0")),
        ("(* \"x\" \"y\")", Invalid),
        ("(/ 4 2)", Renders("2")),
        ("(/ 4.0 2)", Renders("2.0")),
        ("(/ \"x\" \"y\")", Invalid),
        ("(/ 1 0)", Invalid),
        ("(% 9 3)", Renders("0")),
        ("(% 9 5)", Renders("4")),
        ("(% 9.0 5)", Invalid),
        ("(% \"x\" \"y\")", Invalid),
        ("(abs -10)", Renders("10")),
        ("(abs -10.0)", Renders("10.0")),
        ("(abs \"negativeone\")", Invalid),
        ("(factorial 0)", Renders("1")),
        ("(factorial 10)", Renders("3628800")),
        ("(factorial 20)", Renders("2432902008176640000")),
        ("(factorial 21)", Invalid),
        ("(factorial 1.0)", Invalid),
        ("(factorial -1)", Invalid),
        ("(max 1 9 3)", Renders("9")),
        ("(min 1 9 3.0)", Renders("1.0")),
    ]);
}

#[test]
fn comparisons() {
    check_all(&[
        ("(> 4 2)", Renders("#t")),
        ("(> 2.0 2.0)", Renders("#f")),
        ("(> \"hello\" \"world\")", Renders("#f")),
        ("(> \"two\" 1.0)", Invalid),
        ("(< 4 2)", Renders("#f")),
        ("(< 2.0 2.0)", Renders("#f")),
        ("(< \"hello\" \"world\")", Renders("#t")),
        ("(< \"two\" 1.0)", Invalid),
        ("(>= 4 2)", Renders("#t")),
        ("(>= 2.0 2.0)", Renders("#t")),
        ("(>= \"hello\" \"world\")", Renders("#f")),
        ("(<= 4 2)", Renders("#f")),
        ("(<= 2.0 2.0)", Renders("#t")),
        ("(<= \"hello\" \"world\")", Renders("#t")),
        ("(<= \"two\" 1.0)", Invalid),
        ("(= 4 2)", Renders("#f")),
        ("(= 2.0 2.0)", Renders("#t")),
        ("(= \"hello\" \"hello\")", Renders("#t")),
        ("(= \"two\" 1.0)", Invalid),
    ]);
}

#[test]
fn lists() {
    check_all(&[
        ("(append (quote (1 2)) (quote (3 4)))", Renders("(1 2 3 4)")),
        ("(append (quote ()) (quote (3 4)))", Renders("(3 4)")),
        ("(append 2 3)", Invalid),
        ("(car (quote (1 2)))", Renders("1")),
        ("(car (quote (1)))", Renders("1")),
        ("(car (quote ()))", Invalid),
        ("(car 3)", Invalid),
        ("(cdr (quote (1 2 3)))", Renders("(2 3)")),
        ("(cdr (quote (2 3)))", Renders("(3)")),
        ("(cdr (quote (1)))", Renders("()")),
        ("(cdr 3)", Invalid),
        ("(cons 0 (quote (1 2)))", Renders("(0 1 2)")),
        ("(list 1 2.5 \"x\")", Renders("(1 2.5 x)")),
        ("(null? (quote ()))", Renders("#t")),
    ]);
}

#[test]
fn floating_point_library() {
    check_all(&[
        ("(ceil -9.1)", Renders("-9.0")),
        ("(ceil 9.1)", Renders("10.0")),
        ("(ceil 3)", Invalid),
        ("(floor -9.1)", Renders("-10.0")),
        ("(floor 9.1)", Renders("9.0")),
        ("(floor 3)", Invalid),
        ("(fabs -9.1)", Renders("9.1")),
        ("(fabs -3)", Invalid),
        ("(trunc pi)", Renders("3.0")),
        ("(trunc 1)", Invalid),
        ("(copysign 5.0 -1.0)", Renders("-5.0")),
        ("(copysign -5.0 1.0)", Renders("5.0")),
        ("(copysign 5 -1)", Renders("-5")),
        ("(copysign 5.0 -1)", Renders("-5.0")),
        ("(copysign \"hello\" \"world\")", Invalid),
        ("(fmod 3.0 2.0)", Renders("1.0")),
        ("(fmod 3 2)", Invalid),
        ("(frexp 3.0)", Renders("(0.75 2)")),
        ("(frexp 3)", Invalid),
        ("(ldexp pi 2)", Renders("12.566370614359172")),
        ("(ldexp pi e)", Invalid),
        ("(fsum (quote (1.0 2.0 3.0)))", Renders("6.0")),
        ("(fsum (quote (-1.0 -2.0 3.0)))", Renders("0.0")),
        ("(fsum (quote (1 2 3)))", Renders("6")),
        ("(fsum (quote (-1 -2 3)))", Renders("0")),
        ("(fsum 3.0)", Invalid),
        ("(isinf inf)", Renders("#t")),
        ("(isinf 92233720368547758.56346785346)", Renders("#f")),
        ("(isinf 92233720368547758)", Invalid),
        ("(isnan 92233720368547758.56346785346)", Renders("#f")),
        ("(isnan 92233720368547758)", Renders("#f")),
        ("(isnan (quote hello))", Renders("#t")),
        ("(fsum (quote ()))", Renders("0")),
        ("(quote (1e400 -1e400))", Renders("(inf -inf)")),
        ("(isinf (car (quote (inf))))", Renders("#t")),
    ]);
}

#[test]
fn syntax_errors() {
    check_all(&[
        ("(+ 1 2", Syntax),
        (")", Syntax),
        ("", Syntax),
        ("(+ 1 2))", Syntax),
        ("1\u{0c}2", Syntax),
    ]);
}

#[test]
fn unbound_operands_fail_before_the_call() {
    check_all(&[
        ("(isnan hello)", Unbound),
        ("(car missing)", Unbound),
        ("(fsum (list 1 missing))", Unbound),
        ("(quote (isnan hello))", Renders("(isnan hello)")),
    ]);
}

#[test]
fn unicode_whitespace_separates_forms() {
    init_logging();
    let interpreter = Interpreter::new();
    let value = interpreter
        .eval_source("(define x 1)\u{a0}(define y 2)\u{2003}(+ x\u{0c}y)")
        .unwrap();
    assert_eq!(value, Value::Integer(3));
}

#[test]
fn quoted_lists_render_canonically() {
    init_logging();
    let env = create_global_env();
    for literal in [
        "()",
        "(1 2 3)",
        "(a (b c) ((d)) ())",
        "(1.5 #t #f x)",
        "(define (f x) (undefined-function x))",
    ] {
        let value = run(&format!("(quote {literal})"), &env).unwrap();
        assert_eq!(render(&value), literal);
    }
    // Non-canonical spacing collapses to single spaces
    let value = run("(quote (  1   ( 2 )  ))", &env).unwrap();
    assert_eq!(render(&value), "(1 (2))");
}

#[test]
fn quote_never_evaluates() {
    init_logging();
    let env = create_global_env();
    run("(define counter 0)", &env).unwrap();
    run("(quote (set! counter (+ counter 1)))", &env).unwrap();
    run("(quote (((set! counter 99))))", &env).unwrap();
    assert_eq!(run("counter", &env).unwrap(), Value::Integer(0));
}

#[test]
fn arguments_evaluate_left_to_right() {
    init_logging();
    let env = create_global_env();
    run("(define trace 0)", &env).unwrap();
    // Each argument observes the side effect of the one before it
    let value = run(
        "(list (set! trace (+ (* trace 10) 1)) (set! trace (+ (* trace 10) 2)) (set! trace (+ (* trace 10) 3)))",
        &env,
    )
    .unwrap();
    assert_eq!(render(&value), "(1 12 123)");
}

#[test]
fn failures_abort_the_whole_expression() {
    init_logging();
    let env = create_global_env();
    run("(define x 1)", &env).unwrap();
    let result = run("(list (set! x 2) (car 3) (set! x 3))", &env);
    assert!(matches!(result, Err(Error::InvalidProcedureInput(_))));
    assert_eq!(run("x", &env).unwrap(), Value::Integer(2));
}

#[test]
fn evaluation_is_deterministic() {
    init_logging();
    for source in ["(+ 1 2.5)", "(frexp 10.0)", "(car 3)", "(nope)"] {
        let first = run(source, &create_global_env());
        let second = run(source, &create_global_env());
        match (first, second) {
            (Ok(a), Ok(b)) => assert_eq!(a, b, "{source}"),
            (Err(a), Err(b)) => assert_eq!(a.kind(), b.kind(), "{source}"),
            (a, b) => panic!("{source}: {a:?} vs {b:?}"),
        }
    }
}

#[test]
fn recursive_programs() {
    init_logging();
    let interpreter = Interpreter::new();
    interpreter
        .eval_source(
            "(define (fib n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))
             (define (sum-list xs) (if (null? xs) 0 (+ (car xs) (sum-list (cdr xs)))))",
        )
        .unwrap();
    assert_eq!(interpreter.eval_source("(fib 15)").unwrap(), Value::Integer(610));
    assert_eq!(
        interpreter
            .eval_source("(sum-list (quote (1 2 3 4 5)))")
            .unwrap(),
        Value::Integer(15)
    );
    assert_eq!(
        render(
            &interpreter
                .eval_source("(let ((sq (lambda (x) (* x x)))) (list (sq 3) (sq 1.5)))")
                .unwrap()
        ),
        "(9 2.25)"
    );
}

#[test]
fn host_registered_operations() {
    init_logging();
    fn hypot(a: f64, b: f64) -> f64 {
        a.hypot(b)
    }
    let env = create_global_env();
    env.register_builtin_operation::<_, (f64, f64), f64>("hypot", hypot);
    assert_eq!(run("(hypot 3.0 4.0)", &env).unwrap(), Value::Float(5.0));
    assert!(matches!(
        run("(hypot 3 4)", &env),
        Err(Error::InvalidProcedureInput(_))
    ));
}
