use crate::error::{AppError, Result};
use crate::ml::models::{ModelType, Prediction, TrainingConfig};
use crate::models::Category;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use std::collections::HashMap;

/// Trait for trainers that fit a [`LinearModel`] on vectorized emails
pub trait Trainer: Send + Sync {
    /// Fit on a feature matrix (n_samples × n_features) and one label per row
    fn fit(&self, features: &Array2<f64>, labels: &[Category]) -> Result<LinearModel>;

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Hyperparameters recorded in the artifact metadata
    fn hyperparameters(&self) -> HashMap<String, String>;
}

/// Build the trainer selected by the configuration
pub fn trainer_for(config: &TrainingConfig) -> Box<dyn Trainer> {
    match config.model_type {
        ModelType::LinearSvm => Box::new(LinearSvmTrainer::from_config(config)),
        ModelType::LogisticRegression => Box::new(LogisticRegressionTrainer::from_config(config)),
    }
}

/// Fitted linear decision model: one weight row and bias per class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    model_type: ModelType,

    /// Class of each weight row, stored by display label
    #[serde(with = "class_labels")]
    classes: Vec<Category>,

    /// Weights (n_classes × n_features)
    weights: Array2<f64>,

    /// Bias per class
    bias: Array1<f64>,
}

impl LinearModel {
    pub fn new(
        model_type: ModelType,
        classes: Vec<Category>,
        weights: Array2<f64>,
        bias: Array1<f64>,
    ) -> Result<Self> {
        let model = Self {
            model_type,
            classes,
            weights,
            bias,
        };
        model.check_shape().map_err(AppError::Internal)?;
        Ok(model)
    }

    /// Every class has exactly one weight row and one bias
    pub(crate) fn check_shape(&self) -> std::result::Result<(), String> {
        if self.classes.is_empty()
            || self.weights.nrows() != self.classes.len()
            || self.bias.len() != self.classes.len()
        {
            return Err(format!(
                "inconsistent linear model shape: {} classes, weights {:?}, bias {}",
                self.classes.len(),
                self.weights.shape(),
                self.bias.len()
            ));
        }
        Ok(())
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn classes(&self) -> &[Category] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.weights.ncols()
    }

    /// Raw decision scores `W·x + b`, one per class
    pub fn decision_function(&self, features: ArrayView1<f64>) -> Result<Array1<f64>> {
        if features.len() != self.n_features() {
            return Err(AppError::Internal(format!(
                "feature vector has {} dimensions, model expects {}",
                features.len(),
                self.n_features()
            )));
        }
        Ok(self.weights.dot(&features) + &self.bias)
    }

    /// Predicted category; ties go to the class listed first
    pub fn predict(&self, features: ArrayView1<f64>) -> Result<Category> {
        let scores = self.decision_function(features)?;
        Ok(self.classes[argmax(&scores)])
    }

    /// Prediction with confidence
    ///
    /// Margin models have no probabilities: the winner gets 1.0 and is the
    /// only entry. Probabilistic models report softmax over all classes.
    pub fn predict_with_scores(&self, features: ArrayView1<f64>) -> Result<Prediction> {
        let scores = self.decision_function(features)?;
        let best = argmax(&scores);
        let category = self.classes[best];

        if !self.model_type.is_probabilistic() {
            let per_category = HashMap::from([(category, 1.0)]);
            return Ok(Prediction::new(category, 1.0).with_scores(per_category));
        }

        let probabilities = softmax(&scores);
        let per_category: HashMap<Category, f64> = self
            .classes
            .iter()
            .copied()
            .zip(probabilities.iter().copied())
            .collect();
        let confidence = probabilities.iter().copied().fold(0.0, f64::max);

        Ok(Prediction::new(category, confidence).with_scores(per_category))
    }
}

/// Labels that no longer name a category load as `Other`
mod class_labels {
    use crate::models::Category;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(classes: &[Category], serializer: S) -> Result<S::Ok, S::Error> {
        let labels: Vec<&str> = classes.iter().map(Category::label).collect();
        labels.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Category>, D::Error> {
        let labels = Vec::<String>::deserialize(deserializer)?;
        Ok(labels.iter().map(|label| Category::from_label(label)).collect())
    }
}

fn argmax(scores: &Array1<f64>) -> usize {
    let mut best = 0;
    for (idx, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = idx;
        }
    }
    best
}

fn softmax(scores: &Array1<f64>) -> Array1<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = scores.mapv(|s| (s - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Sorted distinct categories present in the labels
fn distinct_classes(labels: &[Category]) -> Vec<Category> {
    let mut classes: Vec<Category> = labels.to_vec();
    classes.sort_by_key(|c| c.index());
    classes.dedup();
    classes
}

fn check_training_input(features: &Array2<f64>, labels: &[Category]) -> Result<Vec<Category>> {
    if features.nrows() == 0 {
        return Err(AppError::InvalidTrainingData(
            "no training samples".to_string(),
        ));
    }
    if features.nrows() != labels.len() {
        return Err(AppError::InvalidTrainingData(format!(
            "{} feature rows but {} labels",
            features.nrows(),
            labels.len()
        )));
    }

    let classes = distinct_classes(labels);
    if classes.len() < 2 {
        return Err(AppError::InvalidTrainingData(
            "training data must contain at least two categories".to_string(),
        ));
    }
    Ok(classes)
}

/// One-vs-rest linear SVM
///
/// Each binary problem minimizes the L2-regularized squared hinge loss with
/// dual coordinate descent. The bias is learned as the weight of a constant
/// feature.
#[derive(Debug, Clone)]
pub struct LinearSvmTrainer {
    pub c: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub balanced_class_weights: bool,
    pub seed: u64,
}

impl Default for LinearSvmTrainer {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

impl LinearSvmTrainer {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            c: config.c,
            max_iter: config.max_iter,
            tolerance: config.tolerance,
            balanced_class_weights: config.balanced_class_weights,
            seed: config.seed,
        }
    }

    /// Per-class weight `n / (k × n_c)`, or 1.0 when unbalanced
    fn class_weights(&self, labels: &[Category], classes: &[Category]) -> HashMap<Category, f64> {
        let n = labels.len() as f64;
        let k = classes.len() as f64;
        classes
            .iter()
            .map(|&class| {
                let weight = if self.balanced_class_weights {
                    let n_c = labels.iter().filter(|&&l| l == class).count() as f64;
                    n / (k * n_c)
                } else {
                    1.0
                };
                (class, weight)
            })
            .collect()
    }

    /// Solve one binary problem; returns (weights, bias)
    fn fit_binary(
        &self,
        rows: &[Vec<(usize, f64)>],
        y: &[f64],
        cost: &[f64],
        n_features: usize,
        rng: &mut StdRng,
    ) -> (Array1<f64>, f64) {
        let n = rows.len();
        let mut w = Array1::<f64>::zeros(n_features);
        let mut b = 0.0;
        let mut alpha = vec![0.0; n];

        // Squared hinge: diagonal shift 1 / (2C), no upper bound on alpha
        let diag: Vec<f64> = cost.iter().map(|c| 0.5 / c).collect();
        let qd: Vec<f64> = rows
            .iter()
            .zip(diag.iter())
            .map(|(row, d)| row.iter().map(|(_, v)| v * v).sum::<f64>() + 1.0 + d)
            .collect();

        let mut order: Vec<usize> = (0..n).collect();

        for _ in 0..self.max_iter {
            order.shuffle(rng);
            let mut pg_max = f64::NEG_INFINITY;
            let mut pg_min = f64::INFINITY;

            for &i in &order {
                let margin: f64 = rows[i].iter().map(|&(j, v)| w[j] * v).sum::<f64>() + b;
                let g = y[i] * margin - 1.0 + diag[i] * alpha[i];

                let pg = if alpha[i] == 0.0 { g.min(0.0) } else { g };
                pg_max = pg_max.max(pg);
                pg_min = pg_min.min(pg);

                if pg.abs() > 1e-12 {
                    let old = alpha[i];
                    alpha[i] = (alpha[i] - g / qd[i]).max(0.0);
                    let delta = (alpha[i] - old) * y[i];
                    for &(j, v) in &rows[i] {
                        w[j] += delta * v;
                    }
                    b += delta;
                }
            }

            if pg_max - pg_min <= self.tolerance {
                break;
            }
        }

        (w, b)
    }
}

impl Trainer for LinearSvmTrainer {
    fn fit(&self, features: &Array2<f64>, labels: &[Category]) -> Result<LinearModel> {
        let classes = check_training_input(features, labels)?;
        let n_features = features.ncols();
        let class_weights = self.class_weights(labels, &classes);

        let rows: Vec<Vec<(usize, f64)>> = features
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, &v)| v != 0.0)
                    .map(|(j, &v)| (j, v))
                    .collect()
            })
            .collect();
        let cost: Vec<f64> = labels.iter().map(|l| self.c * class_weights[l]).collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut weights = Array2::zeros((classes.len(), n_features));
        let mut bias = Array1::zeros(classes.len());

        for (k, class) in classes.iter().enumerate() {
            let y: Vec<f64> = labels
                .iter()
                .map(|l| if l == class { 1.0 } else { -1.0 })
                .collect();
            let (w, b) = self.fit_binary(&rows, &y, &cost, n_features, &mut rng);
            weights.row_mut(k).assign(&w);
            bias[k] = b;
        }

        LinearModel::new(ModelType::LinearSvm, classes, weights, bias)
    }

    fn model_type(&self) -> ModelType {
        ModelType::LinearSvm
    }

    fn hyperparameters(&self) -> HashMap<String, String> {
        HashMap::from([
            ("c".to_string(), self.c.to_string()),
            ("max_iter".to_string(), self.max_iter.to_string()),
            ("tolerance".to_string(), self.tolerance.to_string()),
            (
                "class_weight".to_string(),
                if self.balanced_class_weights {
                    "balanced".to_string()
                } else {
                    "none".to_string()
                },
            ),
        ])
    }
}

/// Multinomial logistic regression fitted with smartcore
#[derive(Debug, Clone)]
pub struct LogisticRegressionTrainer {
    /// L2 regularization strength (1 / C)
    pub alpha: f64,
}

impl Default for LogisticRegressionTrainer {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

impl LogisticRegressionTrainer {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            alpha: 1.0 / config.c,
        }
    }

    fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
        let shape = arr.shape();
        let data: Vec<f64> = arr.iter().copied().collect();
        DenseMatrix::new(shape[0], shape[1], data, false)
    }
}

impl Trainer for LogisticRegressionTrainer {
    fn fit(&self, features: &Array2<f64>, labels: &[Category]) -> Result<LinearModel> {
        let classes = check_training_input(features, labels)?;
        let n_features = features.ncols();

        let x = Self::ndarray_to_densematrix(features);
        let y: Vec<i32> = labels.iter().map(|l| l.index() as i32).collect();

        let params = LogisticRegressionParameters::default().with_alpha(self.alpha);
        let model = LogisticRegression::fit(&x, &y, params).map_err(|e| {
            AppError::Internal(format!("Failed to train logistic regression: {}", e))
        })?;

        let coefficients = model.coefficients();
        let intercept = model.intercept();
        let (n_rows, n_cols) = coefficients.shape();
        if n_cols != n_features {
            return Err(AppError::Internal(format!(
                "logistic regression returned {} coefficients per class, expected {}",
                n_cols, n_features
            )));
        }

        let mut weights = Array2::zeros((classes.len(), n_features));
        let mut bias = Array1::zeros(classes.len());

        if n_rows == 1 {
            // Binary fit: one row scores the second class against the first
            for j in 0..n_features {
                weights[[1, j]] = *coefficients.get((0, j));
            }
            bias[1] = *intercept.get((0, 0));
        } else {
            for k in 0..n_rows.min(classes.len()) {
                for j in 0..n_features {
                    weights[[k, j]] = *coefficients.get((k, j));
                }
                bias[k] = *intercept.get((k, 0));
            }
        }

        LinearModel::new(ModelType::LogisticRegression, classes, weights, bias)
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn hyperparameters(&self) -> HashMap<String, String> {
        HashMap::from([("alpha".to_string(), self.alpha.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Four well separated clusters, one per category
    fn create_test_dataset() -> (Array2<f64>, Vec<Category>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for category in Category::ALL {
            for i in 0..6 {
                let mut row = vec![0.0; 4];
                row[category.index()] = 1.0 + (i as f64) * 0.1;
                rows.extend(row);
                labels.push(category);
            }
        }
        let features = Array2::from_shape_vec((labels.len(), 4), rows).unwrap();
        (features, labels)
    }

    #[test]
    fn test_linear_svm_separates_clusters() {
        let (features, labels) = create_test_dataset();
        let model = LinearSvmTrainer::default().fit(&features, &labels).unwrap();

        assert_eq!(model.classes(), &Category::ALL);
        assert_eq!(model.n_features(), 4);
        for (row, label) in features.rows().into_iter().zip(labels.iter()) {
            assert_eq!(model.predict(row).unwrap(), *label);
        }
    }

    #[test]
    fn test_linear_svm_is_deterministic() {
        let (features, labels) = create_test_dataset();
        let a = LinearSvmTrainer::default().fit(&features, &labels).unwrap();
        let b = LinearSvmTrainer::default().fit(&features, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_margin_prediction_has_single_score() {
        let (features, labels) = create_test_dataset();
        let model = LinearSvmTrainer::default().fit(&features, &labels).unwrap();

        let prediction = model.predict_with_scores(features.row(0)).unwrap();
        assert_eq!(prediction.category, Category::BillingIssue);
        assert_eq!(prediction.confidence, 1.0);
        assert_eq!(prediction.per_category_scores.len(), 1);
        assert_eq!(prediction.per_category_scores[&Category::BillingIssue], 1.0);
    }

    #[test]
    fn test_logistic_regression_probabilities() {
        let (features, labels) = create_test_dataset();
        let model = LogisticRegressionTrainer::default()
            .fit(&features, &labels)
            .unwrap();

        let prediction = model.predict_with_scores(features.row(0)).unwrap();
        let total: f64 = prediction.per_category_scores.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(prediction.per_category_scores.len(), 4);
        assert!(prediction.confidence > 0.0 && prediction.confidence <= 1.0);
        let max = prediction
            .per_category_scores
            .values()
            .copied()
            .fold(0.0, f64::max);
        assert_eq!(prediction.confidence, max);
    }

    #[test]
    fn test_logistic_regression_two_categories() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            let category = if i % 2 == 0 {
                Category::BillingIssue
            } else {
                Category::Feedback
            };
            let mut row = vec![0.0; 3];
            row[i % 2] = 1.0 + (i as f64) * 0.05;
            rows.extend(row);
            labels.push(category);
        }
        let features = Array2::from_shape_vec((labels.len(), 3), rows).unwrap();

        let model = LogisticRegressionTrainer::default()
            .fit(&features, &labels)
            .unwrap();

        assert_eq!(model.classes(), &[Category::BillingIssue, Category::Feedback]);
        for (row, label) in features.rows().into_iter().zip(labels.iter()) {
            assert_eq!(model.predict(row).unwrap(), *label);
        }

        let prediction = model.predict_with_scores(features.row(1)).unwrap();
        assert_eq!(prediction.per_category_scores.len(), 2);
        assert!(prediction.per_category_scores[&Category::Feedback] > 0.5);
    }

    #[test]
    fn test_classes_stored_as_labels() {
        let model = LinearModel::new(
            ModelType::LinearSvm,
            vec![Category::TechnicalSupport, Category::Feedback],
            Array2::zeros((2, 2)),
            array![0.0, 0.0],
        )
        .unwrap();

        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["classes"][0], "Technical Support");
        assert_eq!(json["classes"][1], "Feedback");

        let bytes = bincode::serialize(&model).unwrap();
        let restored: LinearModel = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn test_unknown_stored_label_predicts_other() {
        #[derive(Serialize)]
        struct StoredModel {
            model_type: ModelType,
            classes: Vec<String>,
            weights: Array2<f64>,
            bias: Array1<f64>,
        }

        let stored = StoredModel {
            model_type: ModelType::LinearSvm,
            classes: vec!["Billing Issue".to_string(), "Spam".to_string()],
            weights: array![[1.0, 0.0], [0.0, 1.0]],
            bias: array![0.0, 0.0],
        };
        let bytes = bincode::serialize(&stored).unwrap();

        let model: LinearModel = bincode::deserialize(&bytes).unwrap();
        assert_eq!(model.classes(), &[Category::BillingIssue, Category::Other]);
        assert_eq!(
            model.predict(array![0.0, 1.0].view()).unwrap(),
            Category::Other
        );
        assert_eq!(
            model.predict(array![1.0, 0.0].view()).unwrap(),
            Category::BillingIssue
        );
    }

    #[test]
    fn test_single_class_rejected() {
        let features = Array2::zeros((3, 2));
        let labels = vec![Category::Feedback; 3];
        let err = LinearSvmTrainer::default().fit(&features, &labels).unwrap_err();
        assert!(matches!(err, AppError::InvalidTrainingData(_)));
    }

    #[test]
    fn test_zero_vector_prediction_is_deterministic() {
        let model = LinearModel::new(
            ModelType::LinearSvm,
            vec![Category::BillingIssue, Category::Other],
            Array2::zeros((2, 3)),
            array![0.0, 0.0],
        )
        .unwrap();

        // Equal scores resolve to the first class
        let zero = Array1::zeros(3);
        assert_eq!(model.predict(zero.view()).unwrap(), Category::BillingIssue);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let model = LinearModel::new(
            ModelType::LinearSvm,
            vec![Category::BillingIssue, Category::Other],
            Array2::zeros((2, 3)),
            array![0.0, 0.0],
        )
        .unwrap();

        let wrong = Array1::zeros(5);
        assert!(model.predict(wrong.view()).is_err());
    }

    #[test]
    fn test_inconsistent_shape_rejected() {
        let result = LinearModel::new(
            ModelType::LinearSvm,
            vec![Category::BillingIssue],
            Array2::zeros((2, 3)),
            array![0.0, 0.0],
        );
        assert!(result.is_err());
    }
}
