//! Content fingerprinting: normalization, shingles, feature summaries,
//! and the weighted similarity score between two fingerprints.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

pub const SHINGLE_WEIGHT: f64 = 0.7;
pub const FEATURE_WEIGHT: f64 = 0.3;

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() {
                ch.to_lowercase().next().unwrap_or(ch)
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sentence tokenization over the original text, split on terminators.
pub fn sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

/// Normalized token set of a text fragment.
pub fn token_set(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Intersection over union. Two empty sets are considered identical.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Statistical features of a text, independent of the shingle set.
#[derive(Debug, Clone, Default)]
pub struct FeatureSummary {
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_word_length: f64,
    pub vocabulary: HashSet<String>,
    /// 2-gram and 3-gram frequencies, keyed by the joined token window.
    pub ngrams: HashMap<String, u32>,
}

impl FeatureSummary {
    fn extract(original: &str, tokens: &[&str]) -> Self {
        let word_count = tokens.len();
        let total_len: usize = tokens.iter().map(|t| t.len()).sum();
        let avg_word_length = if word_count > 0 {
            total_len as f64 / word_count as f64
        } else {
            0.0
        };
        let vocabulary: HashSet<String> = tokens.iter().map(|t| t.to_string()).collect();

        let mut ngrams: HashMap<String, u32> = HashMap::new();
        for n in [2usize, 3] {
            for window in tokens.windows(n) {
                *ngrams.entry(window.join(" ")).or_insert(0) += 1;
            }
        }

        Self {
            word_count,
            sentence_count: sentences(original).len(),
            avg_word_length,
            vocabulary,
            ngrams,
        }
    }

    /// Unweighted mean of word-count closeness, vocabulary Jaccard,
    /// average-word-length closeness, and n-gram overlap.
    pub fn similarity(&self, other: &Self) -> f64 {
        let word = closeness(self.word_count as f64, other.word_count as f64);
        let vocab = jaccard(&self.vocabulary, &other.vocabulary);
        let length = closeness(self.avg_word_length, other.avg_word_length);
        let ngram = ngram_overlap(&self.ngrams, &other.ngrams);
        (word + vocab + length + ngram) / 4.0
    }
}

fn closeness(a: f64, b: f64) -> f64 {
    let larger = a.max(b);
    if larger == 0.0 {
        1.0
    } else {
        1.0 - (a - b).abs() / larger
    }
}

/// Sum of per-gram shared counts over the larger total count.
fn ngram_overlap(a: &HashMap<String, u32>, b: &HashMap<String, u32>) -> f64 {
    let total_a: u32 = a.values().sum();
    let total_b: u32 = b.values().sum();
    let larger = total_a.max(total_b);
    if larger == 0 {
        return 1.0;
    }
    let shared: u32 = a
        .iter()
        .map(|(gram, count)| (*count).min(b.get(gram).copied().unwrap_or(0)))
        .sum();
    shared as f64 / larger as f64
}

/// Fingerprint of one text: stable hash, shingle set, feature summary.
#[derive(Debug, Clone)]
pub struct ContentFingerprint {
    pub hash: String,
    pub shingles: HashSet<String>,
    pub features: FeatureSummary,
}

impl ContentFingerprint {
    pub fn from_text(text: &str, shingle_size: usize) -> Self {
        let normalized = normalize(text);
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        // Texts shorter than the window produce an empty shingle set.
        let shingles: HashSet<String> = if shingle_size > 0 && tokens.len() >= shingle_size {
            tokens
                .windows(shingle_size)
                .map(|w| w.join(" "))
                .collect()
        } else {
            HashSet::new()
        };

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        Self {
            hash,
            shingles,
            features: FeatureSummary::extract(text, &tokens),
        }
    }

    /// Weighted score; when both shingle sets are empty the score falls
    /// back entirely to feature similarity. A fingerprint with no words
    /// never matches anything, not even another empty one.
    pub fn similarity(&self, other: &Self) -> f64 {
        if self.features.word_count == 0 || other.features.word_count == 0 {
            return 0.0;
        }
        let features = self.features.similarity(&other.features);
        if self.shingles.is_empty() && other.shingles.is_empty() {
            return features;
        }
        let shingle = jaccard(&self.shingles, &other.shingles);
        SHINGLE_WEIGHT * shingle + FEATURE_WEIGHT * features
    }
}
