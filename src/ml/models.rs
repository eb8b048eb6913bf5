use crate::error::{AppError, Result};
use crate::ml::classifier::LinearModel;
use crate::ml::features::Vocabulary;
use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use validator::Validate;

/// Feature extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeatureConfig {
    /// Maximum vocabulary size (highest corpus frequency terms are kept)
    #[validate(range(min = 1))]
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Minimum number of documents a term must appear in
    #[validate(range(min = 1))]
    #[serde(default = "default_min_doc_freq")]
    pub min_doc_freq: usize,

    /// Maximum fraction of documents a term may appear in
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_max_doc_freq")]
    pub max_doc_freq: f64,

    /// Smallest n-gram length
    #[validate(range(min = 1))]
    #[serde(default = "default_ngram_min")]
    pub ngram_min: usize,

    /// Largest n-gram length
    #[validate(range(min = 1))]
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,

    /// Use TF-IDF weighting (plain term frequency otherwise)
    #[serde(default = "default_true")]
    pub use_idf: bool,

    /// Replace raw counts with 1 + ln(tf)
    #[serde(default)]
    pub sublinear_tf: bool,

    /// Drop English stopwords before building n-grams
    #[serde(default = "default_true")]
    pub remove_stopwords: bool,
}

impl FeatureConfig {
    /// N-gram range (min, max); a max below min is treated as min
    pub fn ngram_range(&self) -> (usize, usize) {
        let min = self.ngram_min.max(1);
        (min, self.ngram_max.max(min))
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            min_doc_freq: default_min_doc_freq(),
            max_doc_freq: default_max_doc_freq(),
            ngram_min: default_ngram_min(),
            ngram_max: default_ngram_max(),
            use_idf: true,
            sublinear_tf: false,
            remove_stopwords: true,
        }
    }
}

/// Offline training configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingConfig {
    /// Optional external labeled dataset (JSON array or JSON lines)
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,

    /// Fraction of each category held out for evaluation
    #[validate(range(min = 0.05, max = 0.5))]
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the stratified shuffle and the solver
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Decision model to fit
    #[serde(default)]
    pub model_type: ModelType,

    /// Inverse regularization strength for the linear SVM
    #[validate(range(min = 0.000001))]
    #[serde(default = "default_c")]
    pub c: f64,

    /// Maximum solver epochs
    #[validate(range(min = 1))]
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Solver stopping tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Weight classes inversely to their frequency
    #[serde(default = "default_true")]
    pub balanced_class_weights: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: None,
            test_size: default_test_size(),
            seed: default_seed(),
            model_type: ModelType::default(),
            c: default_c(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
            balanced_class_weights: true,
        }
    }
}

/// Result of the statistical classifier's confidence query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted category
    pub category: Category,

    /// Confidence in the predicted category (0.0 - 1.0)
    pub confidence: f64,

    /// Scores per category; a single entry for margin-based models
    pub per_category_scores: HashMap<Category, f64>,
}

impl Prediction {
    pub fn new(category: Category, confidence: f64) -> Self {
        Self {
            category,
            confidence,
            per_category_scores: HashMap::new(),
        }
    }

    pub fn with_scores(mut self, per_category_scores: HashMap<Category, f64>) -> Self {
        self.per_category_scores = per_category_scores;
        self
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Confusion matrix, rows are true classes, columns predictions
    pub confusion_matrix: Vec<Vec<usize>>,

    /// Per-category metrics keyed by category label
    pub per_class_metrics: HashMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            confusion_matrix: Vec::new(),
            per_class_metrics: HashMap::new(),
        }
    }

    /// Compute metrics over the four categories
    pub fn evaluate(y_true: &[Category], y_pred: &[Category]) -> Self {
        let n_samples = y_true.len().min(y_pred.len());
        if n_samples == 0 {
            return Self::new();
        }

        let n_classes = Category::ALL.len();
        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            confusion[t.index()][p.index()] += 1;
        }

        let correct: usize = (0..n_classes).map(|i| confusion[i][i]).sum();
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = HashMap::new();
        for category in Category::ALL {
            let idx = category.index();
            let tp = confusion[idx][idx];
            let fp: usize = (0..n_classes)
                .filter(|&t| t != idx)
                .map(|t| confusion[t][idx])
                .sum();
            let fn_count: usize = (0..n_classes)
                .filter(|&p| p != idx)
                .map(|p| confusion[idx][p])
                .sum();

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                category.label().to_string(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support: tp + fn_count,
                },
            );
        }

        let avg_precision: f64 =
            per_class.values().map(|m| m.precision).sum::<f64>() / n_classes as f64;
        let avg_recall: f64 =
            per_class.values().map(|m| m.recall).sum::<f64>() / n_classes as f64;
        let avg_f1: f64 = per_class.values().map(|m| m.f1_score).sum::<f64>() / n_classes as f64;

        Self {
            accuracy,
            precision: avg_precision,
            recall: avg_recall,
            f1_score: avg_f1,
            confusion_matrix: confusion,
            per_class_metrics: per_class,
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Unique id of this training run
    pub model_id: uuid::Uuid,

    /// Model name
    pub name: String,

    /// Crate version that produced the artifact
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of holdout samples
    pub n_holdout_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Metrics on the training split
    pub training_metrics: ModelMetrics,

    /// Metrics on the holdout split
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}

/// Trained vocabulary and decision model, frozen after load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub vocabulary: Vocabulary,
    pub model: LinearModel,
}

impl ModelArtifact {
    /// Check that the vocabulary and the model describe the same feature space
    pub fn validate(&self) -> Result<()> {
        self.vocabulary.check_indices().map_err(AppError::Serialization)?;
        self.model.check_shape().map_err(AppError::Serialization)?;

        if self.model.n_features() != self.vocabulary.len() {
            return Err(AppError::Serialization(format!(
                "model expects {} features but the vocabulary has {}",
                self.model.n_features(),
                self.vocabulary.len()
            )));
        }
        Ok(())
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// One-vs-rest linear support vector machine (margin scores)
    #[default]
    LinearSvm,

    /// Multinomial logistic regression (class probabilities)
    LogisticRegression,
}

impl ModelType {
    /// Whether the model produces calibrated class probabilities
    pub fn is_probabilistic(&self) -> bool {
        matches!(self, ModelType::LogisticRegression)
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LinearSvm => write!(f, "Linear SVM"),
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
        }
    }
}

impl std::str::FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "linear_svm" | "svm" => Ok(ModelType::LinearSvm),
            "logistic_regression" | "logistic" => Ok(ModelType::LogisticRegression),
            other => Err(format!("unknown model type: {}", other)),
        }
    }
}

fn default_max_features() -> usize {
    5000
}

fn default_min_doc_freq() -> usize {
    2
}

fn default_max_doc_freq() -> f64 {
    0.95
}

fn default_ngram_min() -> usize {
    1
}

fn default_ngram_max() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_c() -> f64 {
    1.0
}

fn default_max_iter() -> usize {
    3000
}

fn default_tolerance() -> f64 {
    1e-4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_perfect_predictions() {
        let y = vec![
            Category::BillingIssue,
            Category::TechnicalSupport,
            Category::Feedback,
            Category::Other,
        ];
        let metrics = ModelMetrics::evaluate(&y, &y);

        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.confusion_matrix[2][2], 1);
    }

    #[test]
    fn test_metrics_per_class_breakdown() {
        let y_true = vec![
            Category::BillingIssue,
            Category::BillingIssue,
            Category::Feedback,
            Category::Other,
        ];
        let y_pred = vec![
            Category::BillingIssue,
            Category::Feedback,
            Category::Feedback,
            Category::Other,
        ];
        let metrics = ModelMetrics::evaluate(&y_true, &y_pred);

        assert_eq!(metrics.accuracy, 0.75);
        let billing = &metrics.per_class_metrics["Billing Issue"];
        assert_eq!(billing.precision, 1.0);
        assert_eq!(billing.recall, 0.5);
        assert_eq!(billing.support, 2);
        let feedback = &metrics.per_class_metrics["Feedback"];
        assert_eq!(feedback.precision, 0.5);
        assert_eq!(feedback.recall, 1.0);
        assert_eq!(metrics.confusion_matrix[0][2], 1);
    }

    #[test]
    fn test_metrics_empty() {
        let metrics = ModelMetrics::evaluate(&[], &[]);
        assert_eq!(metrics.accuracy, 0.0);
        assert!(metrics.per_class_metrics.is_empty());
    }

    #[test]
    fn test_feature_config_defaults() {
        let config = FeatureConfig::default();
        assert_eq!(config.ngram_range(), (1, 2));
        assert_eq!(config.min_doc_freq, 2);
        assert!(config.use_idf);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_training_config_validation() {
        let mut config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        config.test_size = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_type_display_and_parse() {
        assert_eq!(ModelType::LinearSvm.to_string(), "Linear SVM");
        assert_eq!(
            "logistic-regression".parse::<ModelType>().unwrap(),
            ModelType::LogisticRegression
        );
        assert!(!ModelType::LinearSvm.is_probabilistic());
    }
}
