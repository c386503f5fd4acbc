//! Benchmarks for the lexer, compiler and VM.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use replit_lang::bytecode::{compile_source, VM};
use replit_lang::lexer::Scanner;

const STATEMENTS: usize = 40;

/// Sum the first `n` integers with a global counter loop.
fn counting_loop(n: usize) -> String {
    format!(
        "let i = 0;\nlet total = 0;\nwhile (i < {}) {{\n  total = total + i;\n  i = i + 1;\n}}\nprint total;\n",
        n
    )
}

/// A straight-line program of arithmetic print statements.
///
/// Each statement adds six constants, so one chunk holds at most 42 of them.
fn straight_line(statements: usize) -> String {
    (0..statements)
        .map(|i| format!("print ({} + 2) * 3 - {} / 4 == {};\n", i, i, i % 7))
        .collect()
}

fn lexing(c: &mut Criterion) {
    let source = straight_line(STATEMENTS);
    c.bench_function("scan_tokens", |b| {
        b.iter(|| Scanner::new(black_box(&source)).scan_tokens())
    });
}

fn compiling(c: &mut Criterion) {
    let source = straight_line(STATEMENTS);
    c.bench_function("compile", |b| {
        b.iter(|| compile_source(black_box(&source)).expect("compile error"))
    });
}

fn execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_loop");

    for n in [100, 1_000, 10_000] {
        let chunk = compile_source(&counting_loop(n)).expect("compile error");
        group.bench_with_input(BenchmarkId::from_parameter(n), &chunk, |b, chunk| {
            let mut vm = VM::new();
            let mut sink = Vec::new();
            b.iter(|| {
                sink.clear();
                vm.run(black_box(chunk), &mut sink).expect("runtime error");
            })
        });
    }

    group.finish();
}

fn interpret_end_to_end(c: &mut Criterion) {
    let source = counting_loop(1_000);
    c.bench_function("interpret", |b| {
        let mut vm = VM::new();
        let mut out = Vec::new();
        let mut err = Vec::new();
        b.iter(|| {
            out.clear();
            vm.interpret(black_box(&source), &mut out, &mut err)
        })
    });
}

criterion_group!(benches, lexing, compiling, execution, interpret_end_to_end);
criterion_main!(benches);
