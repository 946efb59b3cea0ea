use serde::{Deserialize, Serialize};
use tracing::debug;

use kbase_core::config::RetrievalSettings;
use kbase_core::error::{Error, Result};
use kbase_core::types::SearchHit;
use kbase_embed::cosine_similarity;

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub top_k: usize,
    /// Min-max rescale scores into `[0, 1]` before ranking.
    pub normalize: bool,
    /// Drop hits scoring `<= 0` after rescaling.
    pub drop_non_positive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { top_k: 5, normalize: false, drop_non_positive: false }
    }
}

impl From<&RetrievalSettings> for SearchOptions {
    fn from(s: &RetrievalSettings) -> Self {
        Self { top_k: s.top_k, normalize: s.normalize, drop_non_positive: s.drop_non_positive }
    }
}

impl SearchOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Rank every document of `snapshot` against `query` by cosine similarity.
///
/// Results are sorted by descending score with ties kept in corpus order, and
/// hold at most `top_k` hits.
pub fn retrieve(query: &str, snapshot: &Snapshot, options: &SearchOptions) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Err(Error::EmptyQuery);
    }
    let query_vec = snapshot.project(query);
    let mut scores = snapshot
        .embeddings()
        .iter_rows()
        .map(|row| cosine_similarity(&query_vec, row))
        .collect::<Result<Vec<f32>>>()?;
    if options.normalize {
        min_max_rescale(&mut scores);
    }

    let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
    // sort_by is stable: equal scores keep row order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(options.top_k);
    if options.drop_non_positive {
        ranked.retain(|&(_, score)| score > 0.0);
    }

    let ids = snapshot.document_ids();
    let hits: Vec<SearchHit> = ranked
        .into_iter()
        .map(|(row, score)| SearchHit { document_id: ids[row].clone(), score })
        .collect();
    debug!(version = snapshot.version(), hits = hits.len(), "retrieved");
    Ok(hits)
}

/// Rescale into `[0, 1]`. Leaves scores untouched when they are all equal.
fn min_max_rescale(scores: &mut [f32]) {
    let (min, max) = scores
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return;
    }
    for s in scores.iter_mut() {
        *s = (*s - min) / range;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_maps_to_unit_interval() {
        let mut scores = vec![-0.5, 0.0, 0.5];
        min_max_rescale(&mut scores);
        assert_eq!(scores, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn rescale_skips_constant_scores() {
        let mut scores = vec![0.3, 0.3];
        min_max_rescale(&mut scores);
        assert_eq!(scores, vec![0.3, 0.3]);

        let mut empty: Vec<f32> = Vec::new();
        min_max_rescale(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn options_follow_settings() {
        let settings = RetrievalSettings { top_k: 3, normalize: true, drop_non_positive: true };
        let options = SearchOptions::from(&settings);
        assert_eq!(options.top_k, 3);
        assert!(options.normalize && options.drop_non_positive);
        assert_eq!(SearchOptions::default().with_top_k(9).top_k, 9);
    }
}
