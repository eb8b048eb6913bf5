use crate::models::{combine_text, Category};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Multiplier applied to a category whose boost phrase appears in the subject
pub const SUBJECT_BOOST: f64 = 1.5;

const BILLING_PHRASES: &[&str] = &[
    "invoice", "payment", "billing", "charge", "refund", "subscription", "bill", "receipt",
    "transaction", "credit card", "debit", "overdue", "fee", "cost", "price", "discount",
    "promo code", "coupon",
];

const TECHNICAL_PHRASES: &[&str] = &[
    "error", "bug", "crash", "not working", "broken", "issue", "problem", "cannot", "unable",
    "failed", "failure", "timeout", "slow", "performance", "login", "password", "access",
    "permission", "install", "update", "download", "upload", "connection", "404", "500",
    "server",
];

const FEEDBACK_PHRASES: &[&str] = &[
    "feedback", "suggestion", "recommend", "improve", "love", "great", "excellent", "good",
    "bad", "terrible", "review", "rating", "opinion", "think", "feel", "wish", "would like",
    "feature request", "idea",
];

const BILLING_BOOST: &[&str] = &["bill", "invoice", "payment"];
const TECHNICAL_BOOST: &[&str] = &["error", "bug", "not working"];

/// Phrases scored for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLexicon {
    pub category: Category,
    phrases: Vec<String>,
    subject_boost: Vec<String>,
}

impl CategoryLexicon {
    /// Phrases are stored lowercased; empty phrases are dropped
    pub fn new<S: AsRef<str>>(category: Category, phrases: &[S], subject_boost: &[S]) -> Self {
        fn normalize<S: AsRef<str>>(items: &[S]) -> Vec<String> {
            items
                .iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        }

        Self {
            category,
            phrases: normalize(phrases),
            subject_boost: normalize(subject_boost),
        }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn subject_boost(&self) -> &[String] {
        &self.subject_boost
    }

    /// Total occurrences of all phrases in already-lowercased text
    fn raw_score(&self, text: &str) -> f64 {
        self.phrases
            .iter()
            .map(|phrase| count_occurrences(text, phrase))
            .sum::<usize>() as f64
    }

    fn boosted_by(&self, subject: &str) -> bool {
        self.subject_boost.iter().any(|p| subject.contains(p.as_str()))
    }
}

/// Lexicons for the scored categories, in tie-break priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexicon {
    entries: Vec<CategoryLexicon>,
}

impl Lexicon {
    /// Entries are kept in `Category::ALL` order; `Other` is never scored
    pub fn new(entries: Vec<CategoryLexicon>) -> Self {
        let mut entries: Vec<CategoryLexicon> = entries
            .into_iter()
            .filter(|e| e.category != Category::Other)
            .collect();
        entries.sort_by_key(|e| e.category.index());
        Self { entries }
    }

    pub fn entries(&self) -> &[CategoryLexicon] {
        &self.entries
    }

    pub fn get(&self, category: Category) -> Option<&CategoryLexicon> {
        self.entries.iter().find(|e| e.category == category)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new(vec![
            CategoryLexicon::new(Category::BillingIssue, BILLING_PHRASES, BILLING_BOOST),
            CategoryLexicon::new(Category::TechnicalSupport, TECHNICAL_PHRASES, TECHNICAL_BOOST),
            CategoryLexicon::new(Category::Feedback, FEEDBACK_PHRASES, &[]),
        ])
    }
}

/// Score per category for one email
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub billing: f64,
    pub technical: f64,
    pub feedback: f64,
}

impl CategoryScores {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::BillingIssue => self.billing,
            Category::TechnicalSupport => self.technical,
            Category::Feedback => self.feedback,
            Category::Other => 0.0,
        }
    }

    fn set(&mut self, category: Category, score: f64) {
        match category {
            Category::BillingIssue => self.billing = score,
            Category::TechnicalSupport => self.technical = score,
            Category::Feedback => self.feedback = score,
            Category::Other => {}
        }
    }

    /// Highest scoring category; ties go to the higher priority category and
    /// an all-zero vector is `Other`
    pub fn best(&self) -> Category {
        let mut best = Category::Other;
        let mut best_score = 0.0;
        for category in Category::ALL {
            let score = self.get(category);
            if score > best_score {
                best = category;
                best_score = score;
            }
        }
        best
    }
}

/// Deterministic lexicon scorer
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    lexicon: Lexicon,
}

impl KeywordClassifier {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Score every category for an email
    pub fn scores(&self, subject: &str, body: &str) -> CategoryScores {
        let text = combine_text(subject, body).to_lowercase();
        let subject = subject.to_lowercase();

        let mut scores = CategoryScores::default();
        for entry in self.lexicon.entries() {
            let mut score = entry.raw_score(&text);
            if entry.boosted_by(&subject) {
                score *= SUBJECT_BOOST;
            }
            scores.set(entry.category, score);
        }

        trace!(?scores, "Keyword scores");
        scores
    }

    /// Classify an email; total over all inputs
    pub fn classify(&self, subject: &str, body: &str) -> Category {
        self.scores(subject, body).best()
    }
}

/// Count matches of `needle` starting at every character position,
/// overlapping matches included
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack
        .char_indices()
        .filter(|(i, _)| haystack[*i..].starts_with(needle))
        .count()
}
