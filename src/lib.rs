/// Support email triage
///
/// Classifies support emails into billing, technical, feedback or other,
/// either with a keyword lexicon or with a trained TF-IDF linear model.

pub mod classification;
pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod telemetry;

pub use classification::{ClassifierFacade, EmailClassifier, KeywordClassifier};
pub use config::Config;
pub use error::{AppError, Result};
pub use ml::{ModelTrainer, Prediction, StatisticalClassifier};
pub use models::{Category, Email, LabeledEmail};
