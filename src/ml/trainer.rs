use crate::config::Config;
use crate::error::{AppError, Result};
use crate::ml::classifier::{trainer_for, LinearModel};
use crate::ml::features::{TextVectorizer, Vocabulary};
use crate::ml::models::{
    FeatureConfig, ModelArtifact, ModelMetadata, ModelMetrics, TrainingConfig,
};
use crate::models::{Category, LabeledEmail};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use bincode::Options;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Name recorded in the metadata of every trained artifact
pub const MODEL_NAME: &str = "email_classifier";

/// Offline training run: split, vectorize, fit, evaluate
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    feature_config: FeatureConfig,
    training_config: TrainingConfig,
}

/// Artifact produced by a training run and its evaluation report
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub report: TrainingReport,
}

/// Holdout evaluation of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_training_samples: usize,
    pub n_holdout_samples: usize,
    pub n_features: usize,

    /// Holdout accuracy
    pub accuracy: f64,

    /// Holdout metrics per category
    pub metrics: ModelMetrics,

    /// Prediction made for each holdout example
    pub predictions: Vec<EvaluationRecord>,
}

/// One holdout prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub subject: String,
    pub body: String,
    pub expected: Category,
    pub predicted: Category,
}

impl ModelTrainer {
    pub fn new(feature_config: FeatureConfig, training_config: TrainingConfig) -> Self {
        Self {
            feature_config,
            training_config,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.vectorizer.clone(), config.training.clone())
    }

    pub fn training_config(&self) -> &TrainingConfig {
        &self.training_config
    }

    /// Assemble the configured corpus: external dataset rows, then curated examples
    pub fn build_corpus(&self) -> Result<Vec<LabeledEmail>> {
        let external = load_dataset(self.training_config.dataset_path.as_deref())?;
        let corpus = merge_datasets(external, curated_examples());
        info!("Training corpus assembled: {} examples", corpus.len());
        Ok(corpus)
    }

    /// Train on the configured corpus
    pub fn train_default(&self) -> Result<TrainingOutcome> {
        let corpus = self.build_corpus()?;
        self.train(&corpus)
    }

    /// Train a model on the given examples and evaluate it on a stratified holdout
    pub fn train(&self, examples: &[LabeledEmail]) -> Result<TrainingOutcome> {
        let config = &self.training_config;
        info!(
            "Training {} model on {} examples",
            config.model_type,
            examples.len()
        );

        let (train, holdout) = stratified_split(examples, config.test_size, config.seed)?;
        info!(
            "Stratified split: {} training, {} holdout",
            train.len(),
            holdout.len()
        );

        let train_texts: Vec<String> = train.iter().map(|e| e.text()).collect();
        let train_labels: Vec<Category> = train.iter().map(|e| e.category).collect();

        let vectorizer = TextVectorizer::new(self.feature_config.clone());
        let (vocabulary, train_matrix) = vectorizer.fit_transform(&train_texts)?;
        debug!("Vocabulary fitted with {} terms", vocabulary.len());

        let trainer = trainer_for(config);
        let model = trainer.fit(&train_matrix, &train_labels)?;

        let train_predictions = predict_all(&model, &vocabulary, &train)?;
        let training_metrics = ModelMetrics::evaluate(&train_labels, &train_predictions);

        let holdout_labels: Vec<Category> = holdout.iter().map(|e| e.category).collect();
        let holdout_predictions = predict_all(&model, &vocabulary, &holdout)?;
        let metrics = ModelMetrics::evaluate(&holdout_labels, &holdout_predictions);

        info!(
            "Training complete: train accuracy {:.3}, holdout accuracy {:.3}",
            training_metrics.accuracy, metrics.accuracy
        );

        let predictions = holdout
            .iter()
            .zip(holdout_predictions.iter())
            .map(|(email, &predicted)| EvaluationRecord {
                subject: email.subject.clone(),
                body: email.body.clone(),
                expected: email.category,
                predicted,
            })
            .collect();

        let mut hyperparameters = trainer.hyperparameters();
        hyperparameters.insert("test_size".to_string(), config.test_size.to_string());
        hyperparameters.insert("seed".to_string(), config.seed.to_string());
        let (ngram_min, ngram_max) = self.feature_config.ngram_range();
        hyperparameters.insert(
            "ngram_range".to_string(),
            format!("{}-{}", ngram_min, ngram_max),
        );

        let metadata = ModelMetadata {
            model_id: uuid::Uuid::new_v4(),
            name: MODEL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model_type: trainer.model_type(),
            trained_at: chrono::Utc::now(),
            n_training_samples: train.len(),
            n_holdout_samples: holdout.len(),
            n_features: vocabulary.len(),
            training_metrics,
            validation_metrics: Some(metrics.clone()),
            hyperparameters,
        };

        let report = TrainingReport {
            n_training_samples: train.len(),
            n_holdout_samples: holdout.len(),
            n_features: vocabulary.len(),
            accuracy: metrics.accuracy,
            metrics,
            predictions,
        };

        Ok(TrainingOutcome {
            artifact: ModelArtifact {
                metadata,
                vocabulary,
                model,
            },
            report,
        })
    }

    /// Write an artifact, creating parent directories as needed
    pub fn save(artifact: &ModelArtifact, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, artifact)?;
        writer.flush()?;
        info!("Model artifact saved to {}", path.display());
        Ok(())
    }

    /// Read and validate an artifact written by [`ModelTrainer::save`]
    ///
    /// Decoding is bounded by the file size, so a corrupt length prefix is a
    /// serialization error rather than an oversized allocation.
    pub fn load(path: &Path) -> Result<ModelArtifact> {
        if !path.exists() {
            return Err(AppError::ModelArtifactMissing(path.display().to_string()));
        }

        let bytes = fs::read(path)?;
        let artifact: ModelArtifact = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(bytes.len() as u64)
            .deserialize(&bytes)?;
        artifact.validate()?;
        debug!("Model artifact loaded from {}", path.display());
        Ok(artifact)
    }
}

fn predict_all(
    model: &LinearModel,
    vocabulary: &Vocabulary,
    examples: &[LabeledEmail],
) -> Result<Vec<Category>> {
    examples
        .iter()
        .map(|e| model.predict(vocabulary.transform(&e.text()).view()))
        .collect()
}

/// Split examples per category into (training, holdout)
///
/// Each category contributes `round(n_c × test_size)` examples to the
/// holdout, at least one and never all of them.
pub fn stratified_split(
    examples: &[LabeledEmail],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<LabeledEmail>, Vec<LabeledEmail>)> {
    if examples.is_empty() {
        return Err(AppError::InvalidTrainingData(
            "cannot split an empty dataset".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(examples.len());
    let mut holdout = Vec::new();

    for category in Category::ALL {
        let mut members: Vec<&LabeledEmail> =
            examples.iter().filter(|e| e.category == category).collect();
        let count = members.len();
        if count == 0 {
            continue;
        }
        if count < 2 {
            return Err(AppError::InsufficientClassRepresentation { category, count });
        }

        members.shuffle(&mut rng);
        let n_holdout = ((count as f64) * test_size).round() as usize;
        let n_holdout = n_holdout.clamp(1, count - 1);

        holdout.extend(members[..n_holdout].iter().map(|&e| e.clone()));
        train.extend(members[n_holdout..].iter().map(|&e| e.clone()));
    }

    Ok((train, holdout))
}

/// External rows first, then curated rows; exact duplicates are dropped
pub fn merge_datasets(external: Vec<LabeledEmail>, curated: Vec<LabeledEmail>) -> Vec<LabeledEmail> {
    let mut seen = HashSet::new();
    external
        .into_iter()
        .chain(curated)
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct DatasetRow {
    subject: String,
    body: String,
    category: String,
}

impl DatasetRow {
    fn into_labeled(self) -> Option<LabeledEmail> {
        match self.category.parse::<Category>() {
            Ok(category) => Some(LabeledEmail::new(self.subject, self.body, category)),
            Err(_) => {
                warn!(
                    "Skipping dataset row with unknown category '{}'",
                    self.category
                );
                None
            }
        }
    }
}

/// Read an optional labeled dataset (JSON array or JSON lines)
///
/// No path, or a path that does not exist, yields no rows.
pub fn load_dataset(path: Option<&Path>) -> Result<Vec<LabeledEmail>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    if !path.exists() {
        warn!("Dataset {} not found, using curated examples only", path.display());
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let rows = parse_dataset(&content)?;
    let examples: Vec<LabeledEmail> = rows
        .into_iter()
        .filter_map(DatasetRow::into_labeled)
        .collect();

    info!("Loaded {} examples from {}", examples.len(), path.display());
    Ok(examples)
}

fn parse_dataset(content: &str) -> Result<Vec<DatasetRow>> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| AppError::InvalidTrainingData(format!("malformed dataset: {}", e)));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                AppError::InvalidTrainingData(format!("malformed row on line {}: {}", idx + 1, e))
            })
        })
        .collect()
}

/// Hand-written examples covering every category
pub fn curated_examples() -> Vec<LabeledEmail> {
    const EXAMPLES: &[(&str, &str, Category)] = &[
        // Billing
        ("Double charged this month", "I was charged twice for my subscription, please refund the extra payment", Category::BillingIssue),
        ("Invoice is wrong", "My latest invoice shows the wrong amount for my subscription plan", Category::BillingIssue),
        ("Refund request", "I cancelled my subscription last week and would like a refund", Category::BillingIssue),
        ("Payment declined", "My credit card payment was declined although the card is valid", Category::BillingIssue),
        ("Question about my bill", "Why did my monthly bill increase? The price of my plan looks different", Category::BillingIssue),
        ("Unexpected charge on my card", "There is a charge on my credit card that I do not recognize", Category::BillingIssue),
        ("Need a receipt", "Please send me a receipt for the last payment on my account", Category::BillingIssue),
        ("Promo code not applied", "The discount from my promo code was not applied to the invoice", Category::BillingIssue),
        ("Overdue fee", "I was charged a late fee even though the payment went through on time", Category::BillingIssue),
        ("Cancel subscription and refund", "Please cancel my subscription and refund the remaining charge", Category::BillingIssue),
        // Technical
        ("App crashes on login", "The mobile app crashes every time I try to log in", Category::TechnicalSupport),
        ("Login error", "I get an error when I try to login to my account", Category::TechnicalSupport),
        ("Cannot reset password", "The password reset link is broken and I cannot access my account", Category::TechnicalSupport),
        ("Website not working", "The website is not working and shows a 500 server error", Category::TechnicalSupport),
        ("Upload failed", "File upload failed with a timeout error every time", Category::TechnicalSupport),
        ("Bug in the dashboard", "There is a bug in the dashboard, the charts do not load and the page crashes", Category::TechnicalSupport),
        ("Installation problem", "The install fails with an error after the latest update", Category::TechnicalSupport),
        ("Slow performance", "The app has become very slow and the connection keeps dropping", Category::TechnicalSupport),
        ("Permission denied error", "I get a permission error when I try to access the shared folder", Category::TechnicalSupport),
        ("Download link broken", "The download link returns a 404 error page", Category::TechnicalSupport),
        // Feedback
        ("Feature request for workflow automation", "Would love an automation feature to streamline our approval workflow", Category::Feedback),
        ("UI improvement suggestion", "The navigation menu would be better if it was collapsible", Category::Feedback),
        ("Great product", "I love the new design, great work by the whole team", Category::Feedback),
        ("Suggestion for the dashboard", "My suggestion is to add dark mode to the dashboard, it would improve the experience", Category::Feedback),
        ("Feedback on the new release", "Some feedback on the new release: the editor feels much faster, great job", Category::Feedback),
        ("Idea for reports", "An idea: it would be great to export reports to spreadsheets", Category::Feedback),
        ("Loving the mobile app", "Just wanted to say I love the mobile app, excellent experience", Category::Feedback),
        ("Review of your service", "Excellent service overall, I would recommend it to my colleagues", Category::Feedback),
        ("Feature request", "Feature request: please add keyboard shortcuts to the editor", Category::Feedback),
        ("My opinion on the redesign", "In my opinion the redesign is good but the old layout felt clearer", Category::Feedback),
        // Other
        ("Partnership inquiry", "We are interested in becoming a reseller of your product", Category::Other),
        ("Job application", "I would like to apply for the open position on your careers page", Category::Other),
        ("Press inquiry", "I am a journalist writing an article and would like to interview your founder", Category::Other),
        ("Office address", "What is the mailing address of your headquarters office", Category::Other),
        ("Partnership proposal", "Our company would like to discuss a partnership with your team", Category::Other),
        ("Conference invitation", "We would like to invite your team to speak at our conference next month", Category::Other),
        ("Change of contact person", "Please update our contact person, the new contact is our office manager", Category::Other),
        ("Meeting request", "Could we schedule a meeting next week to discuss the partnership", Category::Other),
        ("Interview request", "A journalist from our magazine would like to interview your team", Category::Other),
        ("General question", "Do you have an office in Europe we could visit next month", Category::Other),
    ];

    EXAMPLES
        .iter()
        .map(|&(subject, body, category)| LabeledEmail::new(subject, body, category))
        .collect()
}
