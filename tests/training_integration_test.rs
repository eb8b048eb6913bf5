/// Integration tests for offline training
///
/// These tests verify:
/// - Train, save, load reproduces the recorded holdout predictions
/// - Both model types train on the curated corpus
/// - External datasets merge ahead of curated examples
/// - The train-if-missing startup path writes an artifact

use email_triage::{
    config::ClassifierConfig,
    ml::{
        curated_examples, load_dataset, merge_datasets, stratified_split, FeatureConfig,
        ModelTrainer, ModelType, StatisticalClassifier, TrainingConfig,
    },
    AppError, Category, LabeledEmail,
};
use std::io::Write;

fn trainer(model_type: ModelType) -> ModelTrainer {
    let training = TrainingConfig {
        model_type,
        ..Default::default()
    };
    ModelTrainer::new(FeatureConfig::default(), training)
}

#[test]
fn test_round_trip_reproduces_holdout_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("model.bin");

    let outcome = trainer(ModelType::LinearSvm)
        .train(&curated_examples())
        .unwrap();
    ModelTrainer::save(&outcome.artifact, &path).unwrap();

    let classifier = StatisticalClassifier::load(&path).unwrap();
    let metadata = classifier.metadata().unwrap();
    assert_eq!(metadata.model_id, outcome.artifact.metadata.model_id);
    assert_eq!(metadata.n_features, outcome.artifact.vocabulary.len());

    assert!(!outcome.report.predictions.is_empty());
    for record in &outcome.report.predictions {
        let predicted = classifier.classify(&record.subject, &record.body).unwrap();
        assert_eq!(predicted, record.predicted, "subject: {:?}", record.subject);
    }
}

#[test]
fn test_logistic_regression_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logistic.bin");

    let outcome = trainer(ModelType::LogisticRegression)
        .train(&curated_examples())
        .unwrap();
    assert_eq!(
        outcome.artifact.metadata.model_type,
        ModelType::LogisticRegression
    );
    ModelTrainer::save(&outcome.artifact, &path).unwrap();

    let classifier = StatisticalClassifier::load(&path).unwrap();
    for record in &outcome.report.predictions {
        let prediction = classifier
            .confidence(&record.subject, &record.body)
            .unwrap();
        assert_eq!(prediction.category, record.predicted);

        let total: f64 = prediction.per_category_scores.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(prediction.confidence > 0.0 && prediction.confidence <= 1.0);
    }
}

#[test]
fn test_training_is_reproducible() {
    let a = trainer(ModelType::LinearSvm)
        .train(&curated_examples())
        .unwrap();
    let b = trainer(ModelType::LinearSvm)
        .train(&curated_examples())
        .unwrap();

    assert_eq!(a.artifact.vocabulary, b.artifact.vocabulary);
    assert_eq!(a.artifact.model, b.artifact.model);
    assert_eq!(a.report.predictions, b.report.predictions);
}

#[test]
fn test_report_covers_every_category() {
    let outcome = trainer(ModelType::LinearSvm)
        .train(&curated_examples())
        .unwrap();

    for category in Category::ALL {
        let held_out = outcome
            .report
            .predictions
            .iter()
            .filter(|r| r.expected == category)
            .count();
        assert_eq!(held_out, 2, "{}", category);

        let metrics = &outcome.report.metrics.per_class_metrics[category.label()];
        assert_eq!(metrics.support, 2);
    }
    assert_eq!(outcome.report.metrics.confusion_matrix.len(), 4);
}

#[test]
fn test_stratified_split_preserves_proportions() {
    let mut data = Vec::new();
    let sizes = [
        (Category::BillingIssue, 20),
        (Category::TechnicalSupport, 10),
        (Category::Feedback, 5),
        (Category::Other, 15),
    ];
    for (category, n) in sizes {
        for i in 0..n {
            data.push(LabeledEmail::new(
                format!("{} {}", category, i),
                "body",
                category,
            ));
        }
    }

    let (train, holdout) = stratified_split(&data, 0.2, 42).unwrap();
    assert_eq!(train.len() + holdout.len(), data.len());

    for (category, n) in sizes {
        let in_holdout = holdout.iter().filter(|e| e.category == category).count();
        let in_train = train.iter().filter(|e| e.category == category).count();
        assert_eq!(in_holdout + in_train, n);
        assert_eq!(in_holdout, ((n as f64) * 0.2).round() as usize);
    }
}

#[test]
fn test_insufficient_class_representation() {
    let mut examples = curated_examples();
    examples.retain(|e| e.category != Category::Feedback);
    examples.push(LabeledEmail::new("Kudos", "Great work", Category::Feedback));

    let err = trainer(ModelType::LinearSvm).train(&examples).unwrap_err();
    assert!(err.is_training_error());
    assert!(matches!(
        err,
        AppError::InsufficientClassRepresentation {
            category: Category::Feedback,
            count: 1
        }
    ));
}

#[test]
fn test_external_dataset_merged_first() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"subject": "Charged twice", "body": "I was charged twice this month", "category": "Billing Issue"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"subject": "Refund request", "body": "I cancelled my subscription last week and would like a refund", "category": "Billing Issue"}}"#
    )
    .unwrap();

    let external = load_dataset(Some(file.path())).unwrap();
    let curated = curated_examples();
    let merged = merge_datasets(external, curated.clone());

    // The second external row duplicates a curated example
    assert_eq!(merged.len(), curated.len() + 1);
    assert_eq!(merged[0].subject, "Charged twice");
    assert_eq!(merged[1].subject, "Refund request");
}

#[test]
fn test_train_if_missing_writes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClassifierConfig {
        model_path: dir.path().join("models").join("email_classifier.bin"),
        train_if_missing: true,
        ..Default::default()
    };

    let classifier = StatisticalClassifier::from_config(
        &config,
        &FeatureConfig::default(),
        &TrainingConfig::default(),
    )
    .unwrap();
    assert!(classifier.is_loaded());
    assert!(config.model_path.exists());

    let reloaded = StatisticalClassifier::load(&config.model_path).unwrap();
    assert_eq!(
        reloaded.metadata().unwrap().model_id,
        classifier.metadata().unwrap().model_id
    );
}

#[test]
fn test_corrupt_artifact_is_serialization_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"definitely not a model").unwrap();

    let err = StatisticalClassifier::load(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Serialization(_)));
}
