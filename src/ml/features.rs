use crate::error::{AppError, Result};
use crate::ml::models::FeatureConfig;
use ndarray::{Array1, Array2};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tokens are runs of two or more word characters
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token pattern is valid"));

/// Standard English stopword list
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
        "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
        "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind",
        "being", "below", "beside", "besides", "between", "beyond", "bill", "both", "bottom",
        "but", "by", "call", "can", "cannot", "cant", "co", "con", "could", "couldnt", "cry",
        "de", "describe", "detail", "do", "done", "down", "due", "during", "each", "eg",
        "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even",
        "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
        "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty",
        "found", "four", "from", "front", "full", "further", "get", "give", "go", "had", "has",
        "hasnt", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein",
        "hereupon", "hers", "herself", "him", "himself", "his", "how", "however", "hundred",
        "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its", "itself",
        "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many", "may",
        "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly",
        "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
        "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
        "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
        "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
        "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem",
        "seemed", "seeming", "seems", "serious", "several", "she", "should", "show", "side",
        "since", "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something",
        "sometime", "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than",
        "that", "the", "their", "them", "themselves", "then", "thence", "there", "thereafter",
        "thereby", "therefore", "therein", "thereupon", "these", "they", "thick", "thin",
        "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus",
        "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
        "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
        "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
        "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
        "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
        "would", "yet", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Frozen n-gram vocabulary with its IDF weights
///
/// Carries the analyzer settings it was built with so that inference
/// tokenizes exactly like training did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vocabulary {
    /// Term -> feature index, indices assigned in lexicographic term order
    terms: BTreeMap<String, usize>,

    /// IDF weight per feature index (all 1.0 without IDF weighting)
    idf: Vec<f64>,

    /// Number of documents the vocabulary was fitted on
    n_documents: usize,

    ngram_range: (usize, usize),
    remove_stopwords: bool,
    use_idf: bool,
    sublinear_tf: bool,
}

impl Vocabulary {
    /// Number of features
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Feature index of a term
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.terms.get(term).copied()
    }

    /// IDF weight of a term
    pub fn idf_of(&self, term: &str) -> Option<f64> {
        self.index_of(term).map(|idx| self.idf[idx])
    }

    /// Terms in feature index order
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    /// Every term index has an IDF weight and no two terms share an index
    pub(crate) fn check_indices(&self) -> std::result::Result<(), String> {
        if self.idf.len() != self.terms.len() {
            return Err(format!(
                "vocabulary has {} terms but {} idf weights",
                self.terms.len(),
                self.idf.len()
            ));
        }
        let mut seen = vec![false; self.terms.len()];
        for (term, &idx) in &self.terms {
            if idx >= seen.len() || seen[idx] {
                return Err(format!("vocabulary term {:?} has invalid index {}", term, idx));
            }
            seen[idx] = true;
        }
        Ok(())
    }

    /// Vectorize one text into an L2-normalized TF-IDF row
    ///
    /// Text with no vocabulary terms yields the zero vector.
    pub fn transform(&self, text: &str) -> Array1<f64> {
        let mut features = Array1::zeros(self.terms.len());
        let terms = TextPreprocessor::analyze(text, self.ngram_range, self.remove_stopwords);

        for (term, count) in TextPreprocessor::count_terms(&terms) {
            if let Some(&idx) = self.terms.get(&term) {
                let tf = if self.sublinear_tf {
                    1.0 + (count as f64).ln()
                } else {
                    count as f64
                };
                features[idx] = if self.use_idf { tf * self.idf[idx] } else { tf };
            }
        }

        let norm = features.dot(&features).sqrt();
        if norm > 0.0 {
            features.mapv_inplace(|v| v / norm);
        }

        features
    }
}

/// Learns a [`Vocabulary`] from a corpus and vectorizes text with it
#[derive(Debug, Clone, Default)]
pub struct TextVectorizer {
    config: FeatureConfig,
}

impl TextVectorizer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Build the vocabulary from a corpus
    pub fn fit<S: AsRef<str>>(&self, corpus: &[S]) -> Result<Vocabulary> {
        if corpus.is_empty() {
            return Err(AppError::InvalidTrainingData(
                "cannot fit vectorizer on an empty corpus".to_string(),
            ));
        }

        let ngram_range = self.config.ngram_range();
        let n_docs = corpus.len();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for doc in corpus {
            let terms =
                TextPreprocessor::analyze(doc.as_ref(), ngram_range, self.config.remove_stopwords);
            for (term, count) in TextPreprocessor::count_terms(&terms) {
                *term_freq.entry(term.clone()).or_insert(0) += count;
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        // Filter vocabulary by document frequency
        let min_df = self.config.min_doc_freq;
        let max_df = if n_docs > 1 {
            self.config.max_doc_freq * n_docs as f64
        } else {
            n_docs as f64
        };

        let mut kept: Vec<(String, usize)> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= min_df && df as f64 <= max_df)
            .map(|(term, _)| (term.clone(), term_freq[term]))
            .collect();

        if kept.is_empty() {
            return Err(AppError::InvalidTrainingData(format!(
                "no terms remain after document frequency pruning ({} documents, min_df={}, max_df={})",
                n_docs, min_df, self.config.max_doc_freq
            )));
        }

        // Highest corpus frequency first, ties by term order
        if kept.len() > self.config.max_features {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            kept.truncate(self.config.max_features);
        }

        let mut sorted: Vec<String> = kept.into_iter().map(|(term, _)| term).collect();
        sorted.sort();

        let idf: Vec<f64> = sorted
            .iter()
            .map(|term| {
                if self.config.use_idf {
                    let df = doc_freq[term] as f64;
                    ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
                } else {
                    1.0
                }
            })
            .collect();

        let terms: BTreeMap<String, usize> = sorted
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect();

        tracing::debug!(
            n_documents = n_docs,
            vocab_size = terms.len(),
            "Fitted text vectorizer"
        );

        Ok(Vocabulary {
            terms,
            idf,
            n_documents: n_docs,
            ngram_range,
            remove_stopwords: self.config.remove_stopwords,
            use_idf: self.config.use_idf,
            sublinear_tf: self.config.sublinear_tf,
        })
    }

    /// Vectorize one text with a fitted vocabulary
    pub fn transform(&self, text: &str, vocabulary: &Vocabulary) -> Array1<f64> {
        vocabulary.transform(text)
    }

    /// Vectorize several texts into a row matrix
    pub fn transform_batch<S: AsRef<str>>(texts: &[S], vocabulary: &Vocabulary) -> Array2<f64> {
        let mut matrix = Array2::zeros((texts.len(), vocabulary.len()));
        for (i, text) in texts.iter().enumerate() {
            matrix.row_mut(i).assign(&vocabulary.transform(text.as_ref()));
        }
        matrix
    }

    /// Fit and transform in one step
    pub fn fit_transform<S: AsRef<str>>(&self, corpus: &[S]) -> Result<(Vocabulary, Array2<f64>)> {
        let vocabulary = self.fit(corpus)?;
        let matrix = Self::transform_batch(corpus, &vocabulary);
        Ok((vocabulary, matrix))
    }
}

/// Text preprocessing utilities
pub struct TextPreprocessor;

impl TextPreprocessor {
    /// Check the built-in English stopword list
    pub fn is_stopword(word: &str) -> bool {
        STOPWORDS.contains(word)
    }

    /// Lowercase and split into tokens of two or more word characters
    pub fn tokenize(text: &str, remove_stopwords: bool) -> Vec<String> {
        let lowered = text.to_lowercase();
        TOKEN_PATTERN
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|w| !remove_stopwords || !Self::is_stopword(w))
            .map(str::to_string)
            .collect()
    }

    /// Contiguous n-grams joined with a single space
    pub fn ngrams(tokens: &[String], ngram_range: (usize, usize)) -> Vec<String> {
        let mut terms = Vec::new();
        for n in ngram_range.0..=ngram_range.1 {
            if n == 0 || n > tokens.len() {
                continue;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    /// Tokenize, drop stopwords and expand into n-grams
    pub fn analyze(text: &str, ngram_range: (usize, usize), remove_stopwords: bool) -> Vec<String> {
        let tokens = Self::tokenize(text, remove_stopwords);
        Self::ngrams(&tokens, ngram_range)
    }

    /// Count term occurrences
    pub fn count_terms(terms: &[String]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for term in terms {
            *counts.entry(term.clone()).or_insert(0) += 1;
        }
        counts
    }
}
