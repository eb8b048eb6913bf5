use crate::config::ClassifierConfig;
use crate::error::{AppError, Result};
use crate::ml::models::{FeatureConfig, ModelArtifact, ModelMetadata, Prediction, TrainingConfig};
use crate::ml::trainer::ModelTrainer;
use crate::models::{combine_text, Category};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trained TF-IDF linear classifier
///
/// The artifact is loaded once and shared read-only; clones share it.
/// Serving a new model means building a new classifier.
#[derive(Debug, Clone)]
pub struct StatisticalClassifier {
    artifact: Option<Arc<ModelArtifact>>,
}

impl StatisticalClassifier {
    /// Load a previously trained artifact
    pub fn load(path: &Path) -> Result<Self> {
        let artifact = ModelTrainer::load(path)?;
        info!(
            "Loaded {} model {} ({} features, trained {})",
            artifact.metadata.model_type,
            artifact.metadata.model_id,
            artifact.metadata.n_features,
            artifact.metadata.trained_at
        );
        Ok(Self::from_artifact(artifact))
    }

    /// Load the configured artifact, training and saving one first if it is
    /// missing and `train_if_missing` is set
    pub fn from_config(
        config: &ClassifierConfig,
        feature_config: &FeatureConfig,
        training_config: &TrainingConfig,
    ) -> Result<Self> {
        let path = config.model_path.as_path();
        if path.exists() {
            return Self::load(path);
        }

        if !config.train_if_missing {
            return Err(AppError::ModelArtifactMissing(path.display().to_string()));
        }

        warn!(
            "Model artifact {} not found, training a new model",
            path.display()
        );
        let trainer = ModelTrainer::new(feature_config.clone(), training_config.clone());
        let outcome = trainer.train_default()?;
        ModelTrainer::save(&outcome.artifact, path)?;
        info!(
            "Trained replacement model with holdout accuracy {:.3}",
            outcome.report.accuracy
        );

        Ok(Self::from_artifact(outcome.artifact))
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self {
            artifact: Some(Arc::new(artifact)),
        }
    }

    /// Classifier without a model; every query fails with `ModelNotLoaded`
    pub fn unloaded() -> Self {
        Self { artifact: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.artifact.as_deref().map(|a| &a.metadata)
    }

    fn artifact(&self) -> Result<&ModelArtifact> {
        self.artifact.as_deref().ok_or(AppError::ModelNotLoaded)
    }

    /// Predict the category of an email
    pub fn classify(&self, subject: &str, body: &str) -> Result<Category> {
        let artifact = self.artifact()?;
        let features = artifact.vocabulary.transform(&combine_text(subject, body));
        let category = artifact.model.predict(features.view())?;
        debug!("Statistical classification: {}", category);
        Ok(category)
    }

    /// Predict with a confidence value and per-category scores
    pub fn confidence(&self, subject: &str, body: &str) -> Result<Prediction> {
        let artifact = self.artifact()?;
        let features = artifact.vocabulary.transform(&combine_text(subject, body));
        artifact.model.predict_with_scores(features.view())
    }
}
