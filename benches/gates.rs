//! Benchmarks for gate evaluation and the adversarial loop.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pive::adversarial;
use pive::analyzer::HeuristicAnalyzer;
use pive::gates::{self, ReferenceData};

const THESIS: &str = "All beings must confront the void, because existence is finite. \
    If meaning is absent, then transcendence emerges from despair. \
    Nihilism reveals the groundlessness of value, and therefore it follows that \
    the ontological weight of nothingness is undeniable.";

fn reference() -> ReferenceData {
    ReferenceData {
        vocabulary: Some(
            ["void", "existence", "nihilism", "transcendence", "ontological", "being"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        ),
        axioms: Vec::new(),
    }
}

fn bench_evaluate(c: &mut Criterion) {
    let analyzer = HeuristicAnalyzer::default();
    let reference = reference();

    c.bench_function("evaluate_six_gates", |bench| {
        bench.iter(|| black_box(gates::evaluate(black_box(THESIS), &reference, &analyzer)))
    });
}

fn bench_formalization(c: &mut Criterion) {
    let analyzer = HeuristicAnalyzer::default();

    c.bench_function("g2_formalization", |bench| {
        bench.iter(|| black_box(gates::formalization(black_box(THESIS), &analyzer)))
    });
}

fn bench_refine(c: &mut Criterion) {
    let analyzer = HeuristicAnalyzer::default();

    c.bench_function("refine_3_iterations", |bench| {
        bench.iter(|| {
            let mut rng = adversarial::loop_rng(Some(0));
            black_box(adversarial::refine(THESIS, 3, &analyzer, &mut rng))
        })
    });
}

criterion_group!(benches, bench_evaluate, bench_formalization, bench_refine);
criterion_main!(benches);
