//! Benchmark: end-to-end compilation
//!
//! Measures parsing, validation, lowering and emission on generated sources.
//! Run: cargo bench --bench compile_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gantry::{parse_source, Compiler, JobGraph};

/// Generate a linear pipeline (job_0 -> job_1 -> ...)
fn generate_linear_source(size: usize) -> String {
    let mut yaml = String::from("workflows:\n  - name: linear\n    on: push\n    jobs:\n");
    for i in 0..size {
        yaml.push_str(&format!("      - name: job_{i}\n        runs_on: ubuntu-latest\n"));
        if i > 0 {
            yaml.push_str(&format!("        needs: [job_{}]\n", i - 1));
        }
        yaml.push_str(&format!("        steps:\n          - run: echo {i}\n"));
    }
    yaml
}

/// Generate `count` cycles, each with a two-job body
fn generate_cycle_source(count: usize) -> String {
    let mut yaml = String::from("workflows:\n  - name: loops\n    on: push\n    cycles:\n");
    for i in 0..count {
        yaml.push_str(&format!(
            r#"      - name: loop_{i}
        max_iters: 5
        until: "ctx.outputs.check.done === 'true'"
        body:
          - name: work
            runs_on: ubuntu-latest
            steps: [{{ run: ./work.sh }}]
          - name: check
            runs_on: ubuntu-latest
            needs: [work]
            outputs: [{{ name: done, value: "${{{{ steps.c.outputs.done }}}}" }}]
            steps: [{{ id: c, run: ./check.sh }}]
"#
        ));
    }
    yaml
}

fn bench_compile_linear(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_linear");
    let compiler = Compiler::default();

    for size in [10, 50, 200] {
        let source = generate_linear_source(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| compiler.compile_source("linear.yaml", black_box(source), &[]))
        });
    }

    group.finish();
}

fn bench_compile_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_cycles");
    let compiler = Compiler::default();

    for count in [1, 5, 20] {
        let source = generate_cycle_source(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &source, |b, source| {
            b.iter(|| compiler.compile_source("loops.yaml", black_box(source), &[]))
        });
    }

    group.finish();
}

fn bench_job_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_graph");

    for size in [50, 500] {
        let parsed = parse_source("linear.yaml", &generate_linear_source(size));
        let file = parsed.file.expect("generated source parses");
        let workflow = file.workflows[0].clone();
        group.bench_with_input(BenchmarkId::from_parameter(size), &workflow, |b, wf| {
            b.iter(|| JobGraph::from_workflow(black_box(wf)).detect_cycles())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile_linear,
    bench_compile_cycles,
    bench_job_graph
);
criterion_main!(benches);
