//! Common types for the memory system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type for memory operations
///
/// Uses UTC to avoid timezone ambiguity.
pub type Timestamp = DateTime<Utc>;

/// Returns the current timestamp
pub fn now() -> Timestamp {
    Utc::now()
}

/// Classification of a long-term memory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Verified, durable fact
    Fact,
    /// Held with less certainty than a fact
    Belief,
    /// Something that happened
    Event,
    /// A working answer to a past problem
    Solution,
    /// A recurring execution pattern
    Pattern,
    /// Produced by consolidation
    Summary,
    /// Default capture type
    Observation,
}

impl EntryType {
    /// Types that are never deleted by forgetting
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Fact | Self::Solution)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Belief => "belief",
            Self::Event => "event",
            Self::Solution => "solution",
            Self::Pattern => "pattern",
            Self::Summary => "summary",
            Self::Observation => "observation",
        }
    }

    /// Parse from the stored string form; unknown strings map to Observation
    pub fn parse(s: &str) -> Self {
        match s {
            "fact" => Self::Fact,
            "belief" => Self::Belief,
            "event" => Self::Event,
            "solution" => Self::Solution,
            "pattern" => Self::Pattern,
            "summary" => Self::Summary,
            _ => Self::Observation,
        }
    }
}

impl Default for EntryType {
    fn default() -> Self {
        Self::Observation
    }
}

/// A single long-term memory entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    /// Deterministic id derived from content and type
    pub id: String,
    /// The remembered text
    pub content: String,
    /// Entry classification
    pub entry_type: EntryType,
    /// Confidence in [0, 1]; decayed by consolidation
    pub confidence: f32,
    /// When the entry was captured
    pub created_at: Timestamp,
    /// When the entry was last returned by recall
    pub last_accessed_at: Timestamp,
    /// Number of times recall returned this entry
    pub access_count: u64,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Embedding vector, if one was computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryEntry {
    /// Default confidence for a freshly captured entry
    pub const CONFIDENCE_DEFAULT: f32 = 0.5;

    /// Create a new entry with a deterministic id
    pub fn new(content: impl Into<String>, entry_type: EntryType) -> Self {
        let content = content.into();
        assert!(!content.is_empty(), "entry content must not be empty");

        let timestamp = now();
        Self {
            id: deterministic_id(&content, entry_type),
            content,
            entry_type,
            confidence: Self::CONFIDENCE_DEFAULT,
            created_at: timestamp,
            last_accessed_at: timestamp,
            access_count: 0,
            tags: Vec::new(),
            metadata: serde_json::Value::Null,
            embedding: None,
        }
    }

    /// Attach tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set confidence
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&confidence),
            "confidence must be within [0, 1]"
        );
        self.confidence = confidence;
        self
    }

    /// Record that recall returned this entry
    pub fn record_access(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now();
    }

    /// Whether this entry is eligible for deletion by forgetting
    pub fn is_forgettable(&self) -> bool {
        self.confidence < selkie_core::MEMORY_FORGET_CONFIDENCE_MAX
            && self.access_count < selkie_core::MEMORY_FORGET_ACCESS_COUNT_MIN
            && !self.entry_type.is_protected()
    }
}

/// Deterministic id for an entry: FNV-1a over type and content
///
/// Re-capturing identical content yields the same id, which makes capture
/// idempotent at the store layer.
pub fn deterministic_id(content: &str, entry_type: EntryType) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in entry_type.as_str().bytes().chain([b':']).chain(content.bytes()) {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("mem-{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_new() {
        let entry = MemoryEntry::new("user prefers dark mode", EntryType::Fact);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.confidence, MemoryEntry::CONFIDENCE_DEFAULT);
        assert!(entry.id.starts_with("mem-"));
    }

    #[test]
    fn test_id_is_deterministic() {
        let a = MemoryEntry::new("same content", EntryType::Fact);
        let b = MemoryEntry::new("same content", EntryType::Fact);
        assert_eq!(a.id, b.id);

        let c = MemoryEntry::new("same content", EntryType::Belief);
        assert_ne!(a.id, c.id, "type participates in the id");

        let d = MemoryEntry::new("other content", EntryType::Fact);
        assert_ne!(a.id, d.id);
    }

    #[test]
    fn test_record_access() {
        let mut entry = MemoryEntry::new("x", EntryType::Event);
        let before = entry.last_accessed_at;
        entry.record_access();
        assert_eq!(entry.access_count, 1);
        assert!(entry.last_accessed_at >= before);
    }

    #[test]
    fn test_forgettable_predicate() {
        let mut entry = MemoryEntry::new("gossip", EntryType::Event).with_confidence(0.1);
        assert!(entry.is_forgettable());

        // Accessed entries survive
        entry.access_count = 2;
        assert!(!entry.is_forgettable());

        // Protected types survive regardless of confidence
        let fact = MemoryEntry::new("fact", EntryType::Fact).with_confidence(0.1);
        assert!(!fact.is_forgettable());
        let solution = MemoryEntry::new("fix", EntryType::Solution).with_confidence(0.1);
        assert!(!solution.is_forgettable());

        // Confident entries survive
        let confident = MemoryEntry::new("x", EntryType::Event).with_confidence(0.9);
        assert!(!confident.is_forgettable());
    }

    #[test]
    fn test_entry_type_parse_roundtrip() {
        for ty in [
            EntryType::Fact,
            EntryType::Belief,
            EntryType::Event,
            EntryType::Solution,
            EntryType::Pattern,
            EntryType::Summary,
            EntryType::Observation,
        ] {
            assert_eq!(EntryType::parse(ty.as_str()), ty);
        }
        assert_eq!(EntryType::parse("garbage"), EntryType::Observation);
    }

    #[test]
    #[should_panic(expected = "confidence must be within")]
    fn test_invalid_confidence_panics() {
        let _ = MemoryEntry::new("x", EntryType::Fact).with_confidence(1.5);
    }
}
