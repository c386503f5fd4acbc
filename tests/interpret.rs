//! End-to-end behavior of `interpret` and `run`.

use pretty_assertions::assert_eq;
use replit_lang::error::ReplitError;
use replit_lang::{run, InterpretResult, VM};

fn interpret(vm: &mut VM, source: &str) -> (InterpretResult, String, String) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let result = vm.interpret(source, &mut out, &mut err);
    (
        result,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

fn print(expr: &str) -> String {
    run(&format!("print {};", expr)).unwrap()
}

#[test]
fn numeric_binary_operations_render_exactly() {
    let cases: &[(f64, &str, f64)] = &[
        (1.0, "+", 2.0),
        (1.5, "+", 2.0),
        (10.0, "-", 12.5),
        (6.0, "*", 7.0),
        (0.5, "*", 0.25),
        (9.0, "/", 4.0),
        (1.0, "/", 3.0),
        (17.0, "%", 5.0),
    ];

    for &(a, op, b) in cases {
        let expected = match op {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            "/" => a / b,
            _ => a % b,
        };
        let expected = replit_lang::bytecode::value::format_number(expected);
        assert_eq!(print(&format!("{} {} {}", a, op, b)), format!("{}\n", expected));
    }
}

#[test]
fn documented_examples() {
    assert_eq!(print("1+2"), "3\n");
    assert_eq!(print("1.5+2"), "3.5\n");
    assert_eq!(print("\"a\"+1"), "a1\n");
    assert_eq!(print("1==1"), "true\n");
    assert_eq!(print("1==\"1\""), "false\n");
    assert_eq!(print("!nil"), "true\n");
    assert_eq!(print("!0"), "false\n");
}

#[test]
fn printing_each_value_kind() {
    assert_eq!(
        run("print 3; print 2.25; print \"raw text\"; print true; print false; print nil;")
            .unwrap(),
        "3\n2.25\nraw text\ntrue\nfalse\nnil\n"
    );
}

#[test]
fn unterminated_string_is_a_compile_error() {
    let mut vm = VM::new();
    let (result, out, err) = interpret(&mut vm, "print \"never closed;");
    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(out, "");
    assert!(err.contains("Unterminated string"), "{}", err);
    assert!(err.starts_with("[line 1]"));
}

#[test]
fn stray_paren_recovers_and_reports_later_errors() {
    let source = "print 1;\nprint 2);\nprint 3;\nprint (4;\nprint 5;";
    let (result, out, err) = interpret(&mut VM::new(), source);
    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(out, "");

    let lines: Vec<&str> = err.lines().collect();
    assert_eq!(
        lines,
        vec![
            "[line 2] Error at ')': Expected ';' after value",
            "[line 4] Error at ';': Expected ')' after expression",
        ]
    );
}

#[test]
fn compile_errors_surface_through_run() {
    match run("print ;") {
        Err(ReplitError::Compile(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors.to_string(),
                "[line 1] Error at ';': Expected expression"
            );
        }
        other => panic!("expected compile error, got {:?}", other),
    }
}

#[test]
fn runtime_errors_surface_through_run() {
    match run("print 1;\nprint 2 * \"x\";") {
        Err(error @ ReplitError::Runtime(_)) => {
            assert_eq!(
                error.to_string(),
                "[line 2] Runtime error: Operands must be numbers"
            );
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn runtime_error_does_not_poison_the_vm() {
    let mut vm = VM::new();
    let (result, _, err) = interpret(&mut vm, "print -true;");
    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(err, "[line 1] Runtime error: Operand must be a number\n");

    let (result, out, err) = interpret(&mut vm, "print 1 + 1;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "2\n");
    assert_eq!(err, "");
}

#[test]
fn same_source_twice_gives_same_output() {
    let source = "let greeting = \"hello\";\nprint greeting + \" world\";\nprint 2 * 21;\n";
    let mut vm = VM::new();
    let first = interpret(&mut vm, source);
    let second = interpret(&mut vm, source);
    assert_eq!(first.0, InterpretResult::Ok);
    assert_eq!(first, second);
    assert_eq!(first.1, "hello world\n42\n");
}

#[test]
fn multi_line_program_with_control_flow() {
    let source = r#"
// countdown with a parity check
let n = 5;
while (n > 0) {
  if (n % 2 == 0) print "even " + n;
  else print "odd " + n;
  n = n - 1;
}
print n == 0 and "done";
"#;
    assert_eq!(
        run(source).unwrap(),
        "odd 5\neven 4\nodd 3\neven 2\nodd 1\ndone\n"
    );
}

#[test]
fn runtime_error_reports_the_failing_line() {
    let source = "let a = 1;\n\n\nprint a + nil;\n";
    let (result, _, err) = interpret(&mut VM::new(), source);
    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(err, "[line 4] Runtime error: Operands must be numbers\n");
}

#[test]
fn forty_arithmetic_statements_fit_in_one_chunk() {
    // Six constants per statement keeps 40 statements under the 256-entry pool.
    let source: String = (0..40)
        .map(|i| format!("print ({} + 2) * 3 - {} / 4 == {};\n", i, i, i % 7))
        .collect();
    let output = run(&source).unwrap();
    assert_eq!(output.lines().count(), 40);
}
