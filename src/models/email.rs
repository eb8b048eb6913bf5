use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Classification outcome for a support email
///
/// The display string of each variant is also the label stored in trained
/// models and external datasets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
pub enum Category {
    #[serde(rename = "Billing Issue")]
    #[strum(serialize = "Billing Issue")]
    BillingIssue,

    #[serde(rename = "Technical Support")]
    #[strum(serialize = "Technical Support")]
    TechnicalSupport,

    #[serde(rename = "Feedback")]
    #[strum(serialize = "Feedback")]
    Feedback,

    #[serde(rename = "Other")]
    #[strum(serialize = "Other")]
    Other,
}

impl Category {
    /// All categories in tie-break priority order
    pub const ALL: [Category; 4] = [
        Category::BillingIssue,
        Category::TechnicalSupport,
        Category::Feedback,
        Category::Other,
    ];

    /// Stable class index used by the statistical models
    pub fn index(&self) -> usize {
        match self {
            Category::BillingIssue => 0,
            Category::TechnicalSupport => 1,
            Category::Feedback => 2,
            Category::Other => 3,
        }
    }

    /// Map a model label to a category. Unknown labels map to `Other`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Category::Other)
    }

    /// Display label, identical to `to_string()`
    pub fn label(&self) -> &'static str {
        match self {
            Category::BillingIssue => "Billing Issue",
            Category::TechnicalSupport => "Technical Support",
            Category::Feedback => "Feedback",
            Category::Other => "Other",
        }
    }
}

/// An email to classify
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Sender address, carried for callers and never used for scoring
    #[serde(default)]
    pub from_address: Option<String>,

    /// Subject line
    pub subject: String,

    /// Message body
    pub body: String,
}

impl Email {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from_address: None,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn with_from_address(mut self, from_address: impl Into<String>) -> Self {
        self.from_address = Some(from_address.into());
        self
    }

    /// Subject and body joined by a single space
    pub fn text(&self) -> String {
        combine_text(&self.subject, &self.body)
    }
}

/// A labeled training example
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabeledEmail {
    pub subject: String,
    pub body: String,
    pub category: Category,
}

impl LabeledEmail {
    pub fn new(subject: impl Into<String>, body: impl Into<String>, category: Category) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            category,
        }
    }

    pub fn text(&self) -> String {
        combine_text(&self.subject, &self.body)
    }
}

/// Joins subject and body the way every classifier sees them
pub fn combine_text(subject: &str, body: &str) -> String {
    format!("{} {}", subject, body)
}
