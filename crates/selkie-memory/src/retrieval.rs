//! Hybrid retrieval over the long-term store
//!
//! Recall fuses three signals per candidate:
//!
//! ```text
//! score = w_vec * cos_sim + w_kw * kw_rank_norm + w_rif * RIF
//! RIF   = w_r * recency + w_i * importance + w_f * frequency
//! ```
//!
//! recency decays exponentially over hours since last access (τ = 24h),
//! importance is the entry's current confidence, frequency saturates at ten
//! accesses. Ties break on `last_accessed_at` descending. Every returned
//! entry has its access statistics updated.

use crate::error::MemoryResult;
use crate::store::LongTermStore;
use crate::types::{MemoryEntry, Timestamp};
use selkie_core::{MEMORY_FREQUENCY_SATURATION_COUNT, MEMORY_RECENCY_TAU_HOURS};
use std::collections::HashMap;

/// Fusion and RIF weights
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Weight of vector cosine similarity
    pub w_vec: f32,
    /// Weight of normalized keyword rank
    pub w_kw: f32,
    /// Weight of the RIF composite
    pub w_rif: f32,
    /// RIF: recency weight
    pub w_recency: f32,
    /// RIF: importance weight
    pub w_importance: f32,
    /// RIF: frequency weight
    pub w_frequency: f32,
    /// Minimum fused score for a result to be returned
    pub score_min: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            w_vec: 0.5,
            w_kw: 0.2,
            w_rif: 0.3,
            w_recency: 0.4,
            w_importance: 0.4,
            w_frequency: 0.2,
            score_min: 0.05,
        }
    }
}

/// An entry returned by recall, with its score breakdown
#[derive(Debug, Clone)]
pub struct RecalledEntry {
    pub entry: MemoryEntry,
    pub score: f32,
    pub cos_sim: f32,
    pub kw_rank_norm: f32,
    pub rif: f32,
}

/// The RIF composite for an entry at a given instant
pub fn rif_score(entry: &MemoryEntry, config: &RetrievalConfig, now: Timestamp) -> f32 {
    let hours_since_access = (now - entry.last_accessed_at).num_seconds().max(0) as f64 / 3600.0;
    let recency = (-hours_since_access / MEMORY_RECENCY_TAU_HOURS).exp() as f32;
    let importance = entry.confidence;
    let frequency =
        (entry.access_count as f32 / MEMORY_FREQUENCY_SATURATION_COUNT as f32).min(1.0);

    config.w_recency * recency + config.w_importance * importance + config.w_frequency * frequency
}

/// Run hybrid recall against the store
///
/// `query_embedding` may be None (no embedder configured or embedding
/// failed); recall then degrades to keyword + RIF only.
pub fn recall(
    store: &LongTermStore,
    query_text: &str,
    query_embedding: Option<&[f32]>,
    top_k: usize,
    config: &RetrievalConfig,
) -> MemoryResult<Vec<RecalledEntry>> {
    assert!(top_k > 0, "top_k must be positive");
    let candidate_limit = top_k * 2;

    // Signal 1: vector recall
    let mut cos_by_id: HashMap<String, f32> = HashMap::new();
    if let Some(embedding) = query_embedding {
        for (id, similarity) in store.search_by_vector(embedding, candidate_limit)? {
            cos_by_id.insert(id, similarity);
        }
    }

    // Signal 2: keyword recall, rank position normalized to (0, 1]
    let keyword_hits = store.search_by_keyword(query_text, candidate_limit)?;
    let mut kw_by_id: HashMap<String, f32> = HashMap::new();
    let total = keyword_hits.len() as f32;
    for (position, (id, _rank)) in keyword_hits.into_iter().enumerate() {
        let normalized = 1.0 - (position as f32 / total.max(1.0));
        kw_by_id.insert(id, normalized);
    }

    // Union of candidates
    let mut candidate_ids: Vec<String> = cos_by_id.keys().cloned().collect();
    for id in kw_by_id.keys() {
        if !cos_by_id.contains_key(id) {
            candidate_ids.push(id.clone());
        }
    }

    let entries = store.get_many(&candidate_ids)?;
    let now = chrono::Utc::now();

    // Signal 3: RIF, then fuse
    let mut scored: Vec<RecalledEntry> = entries
        .into_iter()
        .map(|entry| {
            let cos_sim = cos_by_id.get(&entry.id).copied().unwrap_or(0.0);
            let kw_rank_norm = kw_by_id.get(&entry.id).copied().unwrap_or(0.0);
            let rif = rif_score(&entry, config, now);
            let score = config.w_vec * cos_sim + config.w_kw * kw_rank_norm + config.w_rif * rif;
            RecalledEntry {
                entry,
                score,
                cos_sim,
                kw_rank_norm,
                rif,
            }
        })
        .filter(|r| r.score >= config.score_min)
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.entry.last_accessed_at.cmp(&a.entry.last_accessed_at))
    });
    scored.truncate(top_k);

    // Access statistics update for everything returned
    let returned_ids: Vec<String> = scored.iter().map(|r| r.entry.id.clone()).collect();
    store.record_access(&returned_ids)?;
    for recalled in &mut scored {
        recalled.entry.record_access();
    }

    Ok(scored)
}

/// Format recalled entries into a context block for prompt injection
pub fn format_context(results: &[RecalledEntry], chars_max: usize) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut lines = Vec::new();
    let mut used = 0usize;
    for recalled in results {
        let line = format!("- {}", recalled.entry.content);
        if used + line.len() > chars_max && !lines.is_empty() {
            break;
        }
        used += line.len();
        lines.push(line);
    }
    lines.join("\n")
}
