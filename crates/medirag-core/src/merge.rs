//! Score-based merge and truncation.
//!
//! The same function bounds results at every leaf, every router, and the
//! federation root. Scores from different sources are treated as directly
//! comparable; that only holds while every leaf embeds with one scheme.

use std::cmp::Ordering;

use medirag_contracts::document::Document;

/// Sort `documents` by descending score and keep the first `k`.
///
/// The sort is stable: documents with equal scores keep the order in which
/// they were produced or concatenated. NaN scores rank below every number.
pub fn merge(mut documents: Vec<Document>, k: usize) -> Vec<Document> {
    documents.sort_by(|a, b| descending(a.score, b.score));
    documents.truncate(k);
    documents
}

fn descending(a: f64, b: f64) -> Ordering {
    rank_key(b).total_cmp(&rank_key(a))
}

fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}
