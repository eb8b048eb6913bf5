use crate::error::Result;
use crate::ml::models::{FeatureConfig, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Classifier selection and artifact location
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Text vectorization settings used when training
    #[serde(default)]
    pub vectorizer: FeatureConfig,

    /// Offline training settings
    #[serde(default)]
    pub training: TrainingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("EMAIL_TRIAGE_CONFIG")
            .unwrap_or_else(|_| "config/email-triage.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration, overriding the defaults with `config_path` if it exists
    pub fn load_from(config_path: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: EMAIL_TRIAGE_)
            .add_source(
                config::Environment::with_prefix("EMAIL_TRIAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate nested sections
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.vectorizer.validate()?;
        Ok(())
    }
}

/// Which classification strategy the facade is built with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    /// Lexicon substring scoring
    #[default]
    Keyword,
    /// Trained TF-IDF linear model
    Statistical,
}

impl std::str::FromStr for ClassifierStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(ClassifierStrategy::Keyword),
            "statistical" | "ml" | "model" => Ok(ClassifierStrategy::Statistical),
            other => Err(format!("unknown classifier strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Strategy selected at construction time
    #[serde(default)]
    pub strategy: ClassifierStrategy,

    /// Location of the serialized model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Train and save a model when the artifact is missing
    #[serde(default)]
    pub train_if_missing: bool,

    /// Serve with the keyword classifier if the statistical one cannot be built
    #[serde(default)]
    pub fallback_to_keyword: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::default(),
            model_path: default_model_path(),
            train_if_missing: false,
            fallback_to_keyword: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing filter directive used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit JSON formatted logs
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/email_classifier.bin")
}

fn default_log_filter() -> String {
    "email_triage=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_defaults() {
        let config = Config::load_from("does/not/exist.toml").unwrap();

        assert_eq!(config.classifier.strategy, ClassifierStrategy::Keyword);
        assert_eq!(config.vectorizer.ngram_range(), (1, 2));
        assert_eq!(config.vectorizer.max_features, 5000);
        assert_eq!(config.training.seed, 42);
        assert!((config.training.test_size - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "keyword".parse::<ClassifierStrategy>().unwrap(),
            ClassifierStrategy::Keyword
        );
        assert_eq!(
            "Statistical".parse::<ClassifierStrategy>().unwrap(),
            ClassifierStrategy::Statistical
        );
        assert!("random".parse::<ClassifierStrategy>().is_err());
    }

    #[test]
    fn test_invalid_training_section_rejected() {
        let mut config = Config::default();
        config.training.test_size = 0.9;
        assert!(config.validate().is_err());
    }
}
