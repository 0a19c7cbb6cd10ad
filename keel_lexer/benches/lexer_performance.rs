//! Lexer throughput benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use keel_common::{CompilerContext, SourceBuffer};
use keel_lexer::tokenize;

fn benchmark_lexer(c: &mut Criterion) {
    let unit = "func fib(n int) int {\n    if n < 2 { return n }\n    return fib(n - 1) + fib(n - 2)\n}\n";
    let source: String = unit.repeat(200);

    c.bench_function("lex_fib_200", |b| {
        b.iter(|| {
            let mut ctx = CompilerContext::new();
            let buffer = SourceBuffer::new("bench.keel", source.clone(), 0);
            black_box(tokenize(&mut ctx, &buffer).unwrap())
        })
    });
}

criterion_group!(benches, benchmark_lexer);
criterion_main!(benches);
