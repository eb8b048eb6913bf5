/// Email classification entry point
///
/// Callers build a [`ClassifierFacade`] once at startup and share it; both
/// strategies are immutable after construction.

pub mod keyword;

pub use keyword::{CategoryLexicon, CategoryScores, KeywordClassifier, Lexicon};

use crate::config::{ClassifierStrategy, Config};
use crate::error::Result;
use crate::ml::{Prediction, StatisticalClassifier};
use crate::models::{Category, Email};
use tracing::{info, warn};

/// Capability shared by every classification strategy
pub trait EmailClassifier: Send + Sync {
    /// Classify an email from its subject and body
    fn classify(&self, subject: &str, body: &str) -> Result<Category>;

    /// Classify an [`Email`]
    fn classify_email(&self, email: &Email) -> Result<Category> {
        self.classify(&email.subject, &email.body)
    }
}

impl EmailClassifier for KeywordClassifier {
    fn classify(&self, subject: &str, body: &str) -> Result<Category> {
        Ok(KeywordClassifier::classify(self, subject, body))
    }
}

impl EmailClassifier for StatisticalClassifier {
    fn classify(&self, subject: &str, body: &str) -> Result<Category> {
        StatisticalClassifier::classify(self, subject, body)
    }
}

/// The strategy selected at construction
#[derive(Debug, Clone)]
pub enum ClassifierFacade {
    Keyword(KeywordClassifier),
    Statistical(StatisticalClassifier),
}

impl ClassifierFacade {
    pub fn keyword() -> Self {
        ClassifierFacade::Keyword(KeywordClassifier::default())
    }

    pub fn statistical(classifier: StatisticalClassifier) -> Self {
        ClassifierFacade::Statistical(classifier)
    }

    /// Build the configured strategy
    ///
    /// A statistical classifier that cannot be built is an error unless
    /// `fallback_to_keyword` is set, in which case the keyword strategy is
    /// served and the failure is logged.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.classifier.strategy {
            ClassifierStrategy::Keyword => {
                info!("Using keyword classifier");
                Ok(Self::keyword())
            }
            ClassifierStrategy::Statistical => {
                match StatisticalClassifier::from_config(
                    &config.classifier,
                    &config.vectorizer,
                    &config.training,
                ) {
                    Ok(classifier) => {
                        info!("Using statistical classifier");
                        Ok(Self::statistical(classifier))
                    }
                    Err(e) if config.classifier.fallback_to_keyword => {
                        warn!(
                            error_code = e.error_code(),
                            "Statistical classifier unavailable ({}), falling back to keyword classifier",
                            e
                        );
                        Ok(Self::keyword())
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    pub fn strategy(&self) -> ClassifierStrategy {
        match self {
            ClassifierFacade::Keyword(_) => ClassifierStrategy::Keyword,
            ClassifierFacade::Statistical(_) => ClassifierStrategy::Statistical,
        }
    }

    pub fn classify(&self, subject: &str, body: &str) -> Result<Category> {
        match self {
            ClassifierFacade::Keyword(c) => Ok(c.classify(subject, body)),
            ClassifierFacade::Statistical(c) => c.classify(subject, body),
        }
    }

    /// Confidence for the statistical strategy; `None` for keyword scoring
    pub fn confidence(&self, subject: &str, body: &str) -> Result<Option<Prediction>> {
        match self {
            ClassifierFacade::Keyword(_) => Ok(None),
            ClassifierFacade::Statistical(c) => c.confidence(subject, body).map(Some),
        }
    }
}

impl EmailClassifier for ClassifierFacade {
    fn classify(&self, subject: &str, body: &str) -> Result<Category> {
        ClassifierFacade::classify(self, subject, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn config_with(strategy: ClassifierStrategy, fallback: bool) -> Config {
        let dir = std::env::temp_dir().join(format!("email-triage-{}", uuid::Uuid::new_v4()));
        let mut config = Config::default();
        config.classifier.strategy = strategy;
        config.classifier.model_path = dir.join("missing.bin");
        config.classifier.fallback_to_keyword = fallback;
        config
    }

    #[test]
    fn test_keyword_facade_never_fails() {
        let facade = ClassifierFacade::keyword();
        assert_eq!(facade.classify("", "").unwrap(), Category::Other);
        assert!(facade.confidence("Invoice", "").unwrap().is_none());
    }

    #[test]
    fn test_statistical_without_artifact_is_error() {
        let config = config_with(ClassifierStrategy::Statistical, false);
        let err = ClassifierFacade::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::ModelArtifactMissing(_)));
    }

    #[test]
    fn test_fallback_to_keyword() {
        let config = config_with(ClassifierStrategy::Statistical, true);
        let facade = ClassifierFacade::from_config(&config).unwrap();
        assert_eq!(facade.strategy(), ClassifierStrategy::Keyword);
    }

    #[test]
    fn test_unloaded_statistical_propagates_error() {
        let facade = ClassifierFacade::statistical(StatisticalClassifier::unloaded());
        assert!(matches!(
            facade.classify("Invoice", "wrong amount"),
            Err(AppError::ModelNotLoaded)
        ));
        assert!(matches!(
            facade.confidence("Invoice", "wrong amount"),
            Err(AppError::ModelNotLoaded)
        ));
    }

    #[test]
    fn test_trait_object_dispatch() {
        let classifiers: Vec<Box<dyn EmailClassifier>> = vec![
            Box::new(KeywordClassifier::default()),
            Box::new(ClassifierFacade::keyword()),
        ];
        let email = Email::new("Payment failed", "My invoice payment was declined");
        for classifier in &classifiers {
            assert_eq!(
                classifier.classify_email(&email).unwrap(),
                Category::BillingIssue
            );
        }
    }
}
