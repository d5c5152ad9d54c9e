//! Memory consolidation and forgetting
//!
//! Periodically (or on demand) recently-captured entries are clustered by
//! embedding similarity and shared tags, each cluster is reduced to a single
//! higher-confidence `summary` entry, and the cluster's sources have their
//! confidence decayed. The same pass deletes entries that have gone cold:
//! low confidence, barely accessed, and not of a protected type.

use crate::embedder::cosine_similarity;
use crate::error::{MemoryError, MemoryResult};
use crate::store::LongTermStore;
use crate::types::{EntryType, MemoryEntry};
use async_trait::async_trait;
use selkie_core::{MEMORY_CONSOLIDATION_DECAY, MEMORY_CONSOLIDATION_SIMILARITY_MIN};
use serde::Serialize;

/// Days of history a consolidation pass considers
pub const CONSOLIDATION_WINDOW_DAYS: i64 = 7;

/// Minimum cluster size worth summarizing
pub const CONSOLIDATION_CLUSTER_SIZE_MIN: usize = 2;

/// Summarizes a cluster of memory contents into one statement
///
/// Injected as an interface so the memory crate stays independent of the LLM
/// stack; when absent, a rule-based topic fold is used instead.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, contents: &[String]) -> MemoryResult<String>;
}

/// Statistics from one consolidation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationStats {
    /// Entries considered
    pub collected: usize,
    /// Clusters found with at least two members
    pub clusters: usize,
    /// Summary entries written
    pub summaries_created: usize,
    /// Source entries whose confidence was decayed
    pub decayed: usize,
    /// Entries deleted by forgetting
    pub forgotten: usize,
}

/// Consolidation engine over the long-term store
pub struct Consolidator<'a> {
    store: &'a LongTermStore,
    summarizer: Option<&'a dyn Summarizer>,
}

impl<'a> Consolidator<'a> {
    pub fn new(store: &'a LongTermStore, summarizer: Option<&'a dyn Summarizer>) -> Self {
        Self { store, summarizer }
    }

    /// Run one consolidation pass
    pub async fn run(&self) -> MemoryResult<ConsolidationStats> {
        let mut stats = ConsolidationStats::default();

        let cutoff = chrono::Utc::now() - chrono::Duration::days(CONSOLIDATION_WINDOW_DAYS);
        let recent: Vec<MemoryEntry> = self
            .store
            .get_created_after(cutoff)?
            .into_iter()
            .filter(|e| e.entry_type != EntryType::Summary)
            .collect();
        stats.collected = recent.len();

        let clusters = self.cluster(&recent)?;
        stats.clusters = clusters.len();

        for cluster in &clusters {
            let contents: Vec<String> = cluster.iter().map(|e| e.content.clone()).collect();
            let summary_text = match self.summarizer {
                Some(summarizer) => match summarizer.summarize(&contents).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "summarizer failed, using rule-based fold");
                        rule_based_summary(&contents)
                    }
                },
                None => rule_based_summary(&contents),
            };

            let confidence = cluster
                .iter()
                .map(|e| e.confidence)
                .fold(0.0f32, f32::max)
                .min(0.9)
                + 0.1;

            let mut tags: Vec<String> = vec!["summary".to_string()];
            for entry in cluster {
                for tag in &entry.tags {
                    if !tags.contains(tag) {
                        tags.push(tag.clone());
                    }
                }
            }

            let summary = MemoryEntry::new(summary_text, EntryType::Summary)
                .with_confidence(confidence.min(1.0))
                .with_tags(tags);
            self.store.store(&summary)?;
            stats.summaries_created += 1;

            for entry in cluster {
                let decayed = (entry.confidence * MEMORY_CONSOLIDATION_DECAY).clamp(0.0, 1.0);
                self.store.set_confidence(&entry.id, decayed)?;
                stats.decayed += 1;
            }
        }

        stats.forgotten = self.forget()?;

        tracing::info!(
            collected = stats.collected,
            clusters = stats.clusters,
            summaries = stats.summaries_created,
            forgotten = stats.forgotten,
            "consolidation pass complete"
        );
        Ok(stats)
    }

    /// Greedy clustering by cosine similarity and shared tags
    fn cluster(&self, entries: &[MemoryEntry]) -> MemoryResult<Vec<Vec<MemoryEntry>>> {
        let mut assigned = vec![false; entries.len()];
        let mut clusters = Vec::new();

        let embeddings: Vec<Option<Vec<f32>>> = entries
            .iter()
            .map(|e| self.store.get_embedding(&e.id))
            .collect::<MemoryResult<Vec<_>>>()?;

        for i in 0..entries.len() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let mut cluster = vec![entries[i].clone()];

            for j in (i + 1)..entries.len() {
                if assigned[j] {
                    continue;
                }

                let similar = match (&embeddings[i], &embeddings[j]) {
                    (Some(a), Some(b)) => {
                        cosine_similarity(a, b) >= MEMORY_CONSOLIDATION_SIMILARITY_MIN
                    }
                    _ => false,
                };
                let shares_tag = !entries[i].tags.is_empty()
                    && entries[i].tags.iter().any(|t| entries[j].tags.contains(t));

                if similar || shares_tag {
                    assigned[j] = true;
                    cluster.push(entries[j].clone());
                }
            }

            if cluster.len() >= CONSOLIDATION_CLUSTER_SIZE_MIN {
                clusters.push(cluster);
            }
        }

        Ok(clusters)
    }

    /// Delete entries matching the forgetting predicate; returns the count
    fn forget(&self) -> MemoryResult<usize> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(365 * 10);
        let all = self.store.get_created_after(cutoff)?;

        let mut forgotten = 0;
        for entry in all {
            if entry.is_forgettable() {
                if self.store.delete(&entry.id)? {
                    forgotten += 1;
                    tracing::debug!(id = %entry.id, "forgot entry");
                }
            }
        }
        Ok(forgotten)
    }
}

/// Fallback summary when no LLM summarizer is available
fn rule_based_summary(contents: &[String]) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut topics = Vec::new();
    for content in contents {
        for word in content.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if word.len() > 3 && seen.insert(word.clone()) {
                topics.push(word);
            }
            if topics.len() >= 10 {
                break;
            }
        }
    }

    if topics.is_empty() {
        format!("{} related observations", contents.len())
    } else {
        format!(
            "{} related observations about {}",
            contents.len(),
            topics.join(", ")
        )
    }
}

/// Summarizer error helper for implementors
pub fn summarization_failed(reason: impl Into<String>) -> MemoryError {
    MemoryError::SummarizationFailed {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::{Embedder, MockEmbedder};

    struct EchoSummarizer;

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, contents: &[String]) -> MemoryResult<String> {
            Ok(format!("summary of {} items", contents.len()))
        }
    }

    async fn store_with(contents: &[(&str, &[&str])]) -> LongTermStore {
        let embedder = MockEmbedder::new(16);
        let store = LongTermStore::open_in_memory(16).unwrap();
        for (content, tags) in contents {
            let mut entry = MemoryEntry::new(*content, EntryType::Observation)
                .with_tags(tags.iter().map(|t| t.to_string()).collect());
            entry.embedding = Some(embedder.embed(content).await.unwrap());
            store.store(&entry).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_shared_tags_cluster_and_summarize() {
        let store = store_with(&[
            ("did standup at nine", &["work"]),
            ("reviewed the deploy", &["work"]),
            ("watered the plants", &["home"]),
        ])
        .await;

        let consolidator = Consolidator::new(&store, Some(&EchoSummarizer));
        let stats = consolidator.run().await.unwrap();

        assert_eq!(stats.clusters, 1);
        assert_eq!(stats.summaries_created, 1);
        assert_eq!(stats.decayed, 2);
    }

    #[tokio::test]
    async fn test_sources_are_decayed() {
        let store = store_with(&[("alpha task", &["t"]), ("beta task", &["t"])]).await;
        let before: Vec<MemoryEntry> = store
            .get_created_after(chrono::Utc::now() - chrono::Duration::days(1))
            .unwrap();

        let consolidator = Consolidator::new(&store, None);
        consolidator.run().await.unwrap();

        for entry in before {
            if entry.entry_type != EntryType::Summary {
                let after = store.get(&entry.id).unwrap().unwrap();
                assert!(
                    (after.confidence - entry.confidence * MEMORY_CONSOLIDATION_DECAY).abs()
                        < 1e-5
                );
            }
        }
    }

    #[tokio::test]
    async fn test_forgetting_deletes_cold_entries() {
        let embedder = MockEmbedder::new(16);
        let store = LongTermStore::open_in_memory(16).unwrap();

        let mut cold = MemoryEntry::new("cold gossip", EntryType::Event).with_confidence(0.1);
        cold.embedding = Some(embedder.embed("cold gossip").await.unwrap());
        store.store(&cold).unwrap();

        let mut kept = MemoryEntry::new("low-confidence fact", EntryType::Fact)
            .with_confidence(0.1);
        kept.embedding = Some(embedder.embed("low-confidence fact").await.unwrap());
        store.store(&kept).unwrap();

        let consolidator = Consolidator::new(&store, None);
        let stats = consolidator.run().await.unwrap();

        assert_eq!(stats.forgotten, 1);
        assert!(store.get(&cold.id).unwrap().is_none());
        assert!(store.get(&kept.id).unwrap().is_some(), "facts are protected");
    }

    #[tokio::test]
    async fn test_no_cluster_below_minimum() {
        let store = store_with(&[("lonely entry", &[])]).await;
        let consolidator = Consolidator::new(&store, None);
        let stats = consolidator.run().await.unwrap();
        assert_eq!(stats.clusters, 0);
        assert_eq!(stats.summaries_created, 0);
    }

    #[test]
    fn test_rule_based_summary_topics() {
        let contents = vec![
            "discussed deployment windows".to_string(),
            "deployment failed on friday".to_string(),
        ];
        let summary = rule_based_summary(&contents);
        assert!(summary.contains("deployment"));
        assert!(summary.contains('2'));
    }
}
