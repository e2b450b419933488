//! Benchmarks for balanced sampling and label comparison

use complexity_eval::{compare, sample, Dataset, Sample};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Imbalanced dataset: class `i` holds `1 + i * i` samples
fn create_dataset(classes: usize) -> Dataset {
    let mut samples = Vec::new();
    for class in 0..classes {
        for _ in 0..=(class * class) {
            let id = samples.len();
            samples.push(Sample {
                id,
                case: "case_2".to_string(),
                code_id: format!("CODE_{}", class % 8),
                call_path: format!("main->solve->kernel_{id}"),
                function_name: format!("kernel_{id}"),
                ground_truth: format!("n^({class}/4)"),
                source_file: None,
                parameters: None,
            });
        }
    }
    Dataset::new(samples)
}

fn benchmark_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("balanced_sampling");

    for classes in &[10, 40, 77] {
        let dataset = create_dataset(*classes);

        group.bench_function(format!("sample_500_from_{classes}_classes"), |b| {
            b.iter(|| sample(black_box(&dataset), black_box(500), 42));
        });
    }

    group.finish();
}

fn benchmark_compare(c: &mut Criterion) {
    c.bench_function("compare_reordered_product", |b| {
        b.iter(|| {
            compare(
                black_box("p^(1/4) * log2(p)^(1) * n^(3/2)"),
                black_box("n^1.5*log2(p)*p^0.25"),
            )
        });
    });

    c.bench_function("compare_malformed", |b| {
        b.iter(|| compare(black_box("I think it is roughly quadratic"), black_box("n^(2)")));
    });
}

criterion_group!(benches, benchmark_sampling, benchmark_compare);
criterion_main!(benches);
