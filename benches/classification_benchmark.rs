//! Criterion benchmarks for email classification
//!
//! These benchmarks measure:
//! - Keyword scoring per email
//! - TF-IDF vectorization with a fitted vocabulary
//! - Statistical classification end to end

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use email_triage::{
    classification::KeywordClassifier,
    ml::{curated_examples, FeatureConfig, ModelTrainer, StatisticalClassifier, TrainingConfig},
};

const SUBJECT: &str = "Login Error - Cannot Access Account";
const BODY: &str = "Since the last update I get an error message when I try to login, \
                    and my invoice page shows a 500 server error as well.";

fn bench_keyword_classify(c: &mut Criterion) {
    let classifier = KeywordClassifier::default();

    c.bench_function("keyword_classify", |b| {
        b.iter(|| classifier.classify(black_box(SUBJECT), black_box(BODY)));
    });
}

fn bench_statistical(c: &mut Criterion) {
    let trainer = ModelTrainer::new(FeatureConfig::default(), TrainingConfig::default());
    let outcome = trainer
        .train(&curated_examples())
        .expect("curated examples train");
    let text = format!("{} {}", SUBJECT, BODY);

    c.bench_function("vectorize", |b| {
        b.iter(|| outcome.artifact.vocabulary.transform(black_box(&text)));
    });

    let classifier = StatisticalClassifier::from_artifact(outcome.artifact);
    c.bench_function("statistical_classify", |b| {
        b.iter(|| classifier.classify(black_box(SUBJECT), black_box(BODY)));
    });
}

fn bench_training(c: &mut Criterion) {
    let trainer = ModelTrainer::new(FeatureConfig::default(), TrainingConfig::default());
    let examples = curated_examples();

    let mut group = c.benchmark_group("training");
    group.sample_size(10);
    group.bench_function("train_curated", |b| {
        b.iter(|| trainer.train(black_box(&examples)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_keyword_classify,
    bench_statistical,
    bench_training
);
criterion_main!(benches);
