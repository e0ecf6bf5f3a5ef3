use std::collections::HashMap;

use crate::models::{MergedResult, RetrievalResult};

/// Weight applied to semantic (embedding similarity) scores.
pub const SEMANTIC_WEIGHT: f32 = 0.7;
/// Weight applied to keyword (full-text) scores.
pub const KEYWORD_WEIGHT: f32 = 0.3;
/// Score given to keyword hits when the lexical backend provides no ranking signal.
pub const DEFAULT_KEYWORD_SCORE: f32 = 0.5;
/// Minimum cosine similarity for a semantic hit to be returned.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeWeights {
    pub semantic: f32,
    pub keyword: f32,
}

impl Default for MergeWeights {
    fn default() -> Self {
        Self {
            semantic: SEMANTIC_WEIGHT,
            keyword: KEYWORD_WEIGHT,
        }
    }
}

/// Combines a semantic and a keyword result list into one ranking.
///
/// Pipeline:
/// 1. Every semantic result is inserted with `score * semantic`.
/// 2. A keyword result whose `chunk_id` is already present adds
///    `score * keyword` to that entry; the existing content, title and
///    metadata are kept. Otherwise it is inserted with `score * keyword`.
/// 3. Entries are sorted by combined score, descending. Ties keep the order
///    in which entries were first seen, so semantic hits precede keyword-only hits.
///
/// The full merged set is returned; truncation is left to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridResultMerger {
    weights: MergeWeights,
}

impl HybridResultMerger {
    pub fn new(weights: MergeWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> MergeWeights {
        self.weights
    }

    pub fn merge(
        &self,
        semantic: Vec<RetrievalResult>,
        keyword: Vec<RetrievalResult>,
    ) -> Vec<MergedResult> {
        // chunk_id -> slot in `merged`; slots preserve first-seen order.
        let mut slots: HashMap<String, usize> =
            HashMap::with_capacity(semantic.len() + keyword.len());
        let mut merged: Vec<MergedResult> = Vec::with_capacity(semantic.len() + keyword.len());

        for mut result in semantic {
            result.relevance_score *= self.weights.semantic;
            match slots.get(&result.chunk_id) {
                // Duplicate within the semantic list: last write wins, slot kept.
                Some(&slot) => merged[slot] = result,
                None => {
                    slots.insert(result.chunk_id.clone(), merged.len());
                    merged.push(result);
                }
            }
        }

        for mut result in keyword {
            let boost = result.relevance_score * self.weights.keyword;
            match slots.get(&result.chunk_id) {
                Some(&slot) => merged[slot].relevance_score += boost,
                None => {
                    result.relevance_score = boost;
                    slots.insert(result.chunk_id.clone(), merged.len());
                    merged.push(result);
                }
            }
        }

        // Stable sort keeps first-seen order among equal scores.
        merged.sort_by(|a, b| rank_key(b.relevance_score).total_cmp(&rank_key(a.relevance_score)));
        merged
    }
}

/// NaN scores rank below everything else.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Convenience wrapper using the default 0.7 / 0.3 weights.
pub fn merge(semantic: Vec<RetrievalResult>, keyword: Vec<RetrievalResult>) -> Vec<MergedResult> {
    HybridResultMerger::default().merge(semantic, keyword)
}
