/// Statistical email classification
///
/// This module provides:
/// - TF-IDF n-gram feature extraction
/// - Linear decision models (linear SVM, logistic regression)
/// - Offline training with a stratified holdout evaluation
/// - A loaded-once classifier over a trained artifact

pub mod classifier;
pub mod features;
pub mod models;
pub mod service;
pub mod trainer;

pub use classifier::{LinearModel, LinearSvmTrainer, LogisticRegressionTrainer, Trainer};
pub use features::{TextPreprocessor, TextVectorizer, Vocabulary};
pub use models::{
    FeatureConfig, ModelArtifact, ModelMetadata, ModelMetrics, ModelType, Prediction,
    TrainingConfig,
};
pub use service::StatisticalClassifier;
pub use trainer::{
    curated_examples, load_dataset, merge_datasets, stratified_split, EvaluationRecord,
    ModelTrainer, TrainingOutcome, TrainingReport,
};
