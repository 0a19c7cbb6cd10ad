//! Parser throughput benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use keel_common::{CompilerContext, SourceBuffer};

fn benchmark_parser(c: &mut Criterion) {
    let unit = "func work(n int, scale double) double {\n    total double = 0.0\n    while n > 0 {\n        total = total + scale\n        n -= 1\n    }\n    return total\n}\n";
    let source: String = unit.repeat(100);

    c.bench_function("parse_work_100", |b| {
        b.iter(|| {
            let mut ctx = CompilerContext::new();
            let buffer = SourceBuffer::new("bench.keel", source.clone(), 0);
            let tokens = keel_lexer::tokenize(&mut ctx, &buffer).unwrap();
            black_box(keel_parser::parse(&mut ctx, tokens).unwrap())
        })
    });
}

criterion_group!(benches, benchmark_parser);
criterion_main!(benches);
