use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cifixer_ai::{classify, ResponseInterpreter};

const STRUCTURED: &str = r#"Analysing...
{"errorType": "dependency", "confidenceScore": 0.8,
 "suggestedFix": {"explanation": "left-pad is missing", "files": [{"path": "package.json", "content": "\"left-pad\": \"1.3.0\"", "diff": ""}]}}
done"#;

fn synthetic_log(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("[{i:05}] step {i} ok\n"))
        .chain(std::iter::once("ERROR: connect ETIMEDOUT, request timed out\n".to_string()))
        .collect()
}

fn bench_interpret(c: &mut Criterion) {
    let interpreter = ResponseInterpreter::new();
    let mut group = c.benchmark_group("interpret");

    group.bench_function("structured", |b| {
        b.iter(|| interpreter.interpret(black_box(STRUCTURED), black_box("")))
    });

    for lines in [10usize, 1_000, 20_000] {
        let log = synthetic_log(lines);
        group.throughput(Throughput::Bytes(log.len() as u64));
        group.bench_with_input(BenchmarkId::new("fallback", lines), &log, |b, log| {
            b.iter(|| interpreter.interpret(black_box("no json here"), black_box(log)))
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let log = synthetic_log(5_000);
    c.bench_function("classify_5000_lines", |b| b.iter(|| classify(black_box(&log))));
}

criterion_group!(benches, bench_interpret, bench_classify);
criterion_main!(benches);
