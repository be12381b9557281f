//! Content fingerprinting and near-duplicate detection.

pub mod engine;
pub mod fingerprint;

pub use engine::{MatchedSegment, PlagiarismReport, SimilarityEngine, SourceMatch};
pub use fingerprint::{ContentFingerprint, FeatureSummary};
