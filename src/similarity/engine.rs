//! Similarity engine: compares new content against a bounded cache of
//! previously checked texts and produces a ranked plagiarism report.

use std::cmp::Ordering;
use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fingerprint::{jaccard, sentences, token_set, ContentFingerprint};
use crate::config::SimilarityConfig;

const PREVIEW_CHARS: usize = 200;

/// One candidate sentence paired with the source sentence it matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedSegment {
    pub candidate: String,
    pub source: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMatch {
    pub source_id: String,
    pub preview: String,
    pub similarity: f64,
    pub matched_segments: Vec<MatchedSegment>,
}

/// Outcome of one plagiarism check, hash included for audit trails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlagiarismReport {
    pub is_plagiarized: bool,
    pub max_similarity: f64,
    pub content_hash: String,
    pub matches: Vec<SourceMatch>,
}

struct CachedContent {
    id: String,
    text: String,
    fingerprint: ContentFingerprint,
}

/// Thread-safe engine with a FIFO cache, oldest entry evicted first.
pub struct SimilarityEngine {
    config: SimilarityConfig,
    cache: RwLock<VecDeque<CachedContent>>,
}

impl SimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(VecDeque::new()),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Direct pairwise score between two texts, bypassing the cache.
    pub fn compare(&self, a: &str, b: &str) -> f64 {
        let fa = ContentFingerprint::from_text(a, self.config.shingle_size);
        let fb = ContentFingerprint::from_text(b, self.config.shingle_size);
        fa.similarity(&fb)
    }

    /// Check `text` against everything seen so far, then cache it so later
    /// checks compare against it as well.
    pub fn check(&self, content_id: impl Into<String>, text: &str) -> PlagiarismReport {
        let content_id = content_id.into();
        let fingerprint = ContentFingerprint::from_text(text, self.config.shingle_size);

        let mut max_similarity: f64 = 0.0;
        let mut matches = Vec::new();
        {
            let cache = self.cache.read();
            for entry in cache.iter() {
                let score = fingerprint.similarity(&entry.fingerprint);
                max_similarity = max_similarity.max(score);
                if score > self.config.threshold {
                    matches.push(SourceMatch {
                        source_id: entry.id.clone(),
                        preview: preview(&entry.text),
                        similarity: score,
                        matched_segments: self.matched_segments(text, &entry.text),
                    });
                }
            }
        }
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });

        let report = PlagiarismReport {
            is_plagiarized: !matches.is_empty(),
            max_similarity,
            content_hash: fingerprint.hash.clone(),
            matches,
        };
        debug!(
            content_id = %content_id,
            max_similarity,
            match_count = report.matches.len(),
            "Similarity check finished"
        );

        self.insert(content_id, text.to_string(), fingerprint);
        report
    }

    fn insert(&self, id: String, text: String, fingerprint: ContentFingerprint) {
        let mut cache = self.cache.write();
        while cache.len() >= self.config.cache_capacity {
            cache.pop_front();
        }
        cache.push_back(CachedContent {
            id,
            text,
            fingerprint,
        });
    }

    /// Pairwise sentence comparison, capped per source.
    fn matched_segments(&self, candidate: &str, source: &str) -> Vec<MatchedSegment> {
        let source_sentences = sentences(source);
        let mut out = Vec::new();
        for cand in sentences(candidate) {
            let cand_tokens = token_set(&cand);
            if cand_tokens.is_empty() {
                continue;
            }
            for src in &source_sentences {
                let score = jaccard(&cand_tokens, &token_set(src));
                if score >= self.config.segment_threshold {
                    out.push(MatchedSegment {
                        candidate: cand.clone(),
                        source: src.clone(),
                        similarity: score,
                    });
                    if out.len() >= self.config.max_segments_per_source {
                        return out;
                    }
                }
            }
        }
        out
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SimilarityEngine {
        SimilarityEngine::new(SimilarityConfig::default())
    }

    const ARTICLE: &str = "Rust gives developers memory safety without garbage collection. \
                           The borrow checker enforces ownership rules at compile time. \
                           Many teams adopt it for systems programming.";

    #[test]
    fn test_first_check_never_matches() {
        let engine = engine();
        let report = engine.check("post-1", ARTICLE);
        assert!(!report.is_plagiarized);
        assert_eq!(report.max_similarity, 0.0);
        assert!(report.matches.is_empty());
        assert_eq!(engine.cache_len(), 1);
    }

    #[test]
    fn test_duplicate_is_flagged_with_segments() {
        let engine = engine();
        engine.check("original", ARTICLE);
        let report = engine.check("copy", ARTICLE);

        assert!(report.is_plagiarized);
        assert!((report.max_similarity - 1.0).abs() < 1e-9);
        assert_eq!(report.matches.len(), 1);
        let hit = &report.matches[0];
        assert_eq!(hit.source_id, "original");
        assert!(!hit.matched_segments.is_empty());
        assert!(hit.matched_segments.len() <= 3);
    }

    #[test]
    fn test_unrelated_text_is_clean() {
        let engine = engine();
        engine.check("original", ARTICLE);
        let report = engine.check(
            "other",
            "Baking sourdough bread requires patience and a mature starter culture. \
             Hydration levels change the crumb texture dramatically.",
        );
        assert!(!report.is_plagiarized);
        assert!(report.matches.is_empty());
    }

    #[test]
    fn test_matches_are_ranked_by_similarity() {
        let engine = engine();
        engine.check("exact", ARTICLE);
        engine.check(
            "partial",
            "Rust gives developers memory safety without garbage collection. \
             The borrow checker enforces ownership rules at compile time. \
             A different closing line about cooking pasta tonight.",
        );
        let report = engine.check("copy", ARTICLE);

        assert!(report.matches.len() >= 2);
        assert_eq!(report.matches[0].source_id, "exact");
        assert!(report.matches[0].similarity >= report.matches[1].similarity);
    }

    #[test]
    fn test_empty_input_does_not_match() {
        let engine = engine();
        engine.check("original", ARTICLE);
        let report = engine.check("empty", "");
        assert!(!report.is_plagiarized);
        assert!(report.matches.is_empty());
    }

    #[test]
    fn test_repeated_empty_input_never_matches() {
        let engine = engine();
        engine.check("first-empty", "");
        let report = engine.check("second-empty", "");

        assert!(!report.is_plagiarized);
        assert_eq!(report.max_similarity, 0.0);
        assert!(report.matches.is_empty());
    }

    #[test]
    fn test_cache_is_bounded_fifo() {
        let mut config = SimilarityConfig::default();
        config.cache_capacity = 3;
        let engine = SimilarityEngine::new(config);

        for i in 0..5 {
            engine.check(format!("content-{i}"), &format!("unique text number {i} about topic {i}"));
        }
        assert_eq!(engine.cache_len(), 3);

        // The oldest entries were evicted; a copy of content-0 finds nothing.
        let report = engine.check("recheck", "unique text number 0 about topic 0");
        assert!(report.matches.iter().all(|m| m.source_id != "content-0"));
    }

    #[test]
    fn test_preview_is_truncated() {
        let long = "word ".repeat(100);
        let engine = engine();
        engine.check("long", &long);
        let report = engine.check("copy", &long);
        assert!(report.matches[0].preview.chars().count() <= PREVIEW_CHARS + 3);
        assert!(report.matches[0].preview.ends_with("..."));
    }
}
