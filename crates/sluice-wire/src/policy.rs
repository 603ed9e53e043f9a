//! On-wire enum encodings.
//!
//! Each enumeration is carried as a fixed lowercase tag; encoding
//! followed by decoding is the identity for every value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a consumer acknowledges delivered messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckPolicy {
    /// No acknowledgments expected.
    None,
    /// Acking a sequence acknowledges everything below it too.
    All,
    /// Every delivery needs an explicit acknowledgment.
    #[default]
    Explicit,
}

impl fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::All => "all",
            Self::Explicit => "explicit",
        })
    }
}

/// Where a consumer starts in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverPolicy {
    /// Deliver every message in the stream.
    #[default]
    #[serde(alias = "undefined")]
    All,
    /// Start with the most recent message.
    Last,
    /// Only messages published after the consumer exists.
    New,
    /// Start at an explicit stream sequence.
    ByStartSequence,
    /// Start at the first message at or after a point in time.
    ByStartTime,
}

impl fmt::Display for DeliverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Last => "last",
            Self::New => "new",
            Self::ByStartSequence => "by_start_sequence",
            Self::ByStartTime => "by_start_time",
        })
    }
}

/// How queued messages are replayed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPolicy {
    /// As fast as possible.
    #[default]
    Instant,
    /// At the original publish timing.
    Original,
}

impl fmt::Display for ReplayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Instant => "instant",
            Self::Original => "original",
        })
    }
}

/// How a stream retains messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Retain until a size/age/count limit evicts.
    #[default]
    Limits,
    /// Retain while any consumer still has interest.
    Interest,
    /// Remove once the first consumer acknowledges.
    WorkQueue,
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Limits => "limits",
            Self::Interest => "interest",
            Self::WorkQueue => "workqueue",
        })
    }
}

/// What happens when a stream hits its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscardPolicy {
    /// Evict the oldest messages.
    #[default]
    Old,
    /// Refuse new messages.
    New,
}

impl fmt::Display for DiscardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Old => "old",
            Self::New => "new",
        })
    }
}

/// Backing storage for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// On-disk storage.
    #[default]
    File,
    /// In-memory only.
    Memory,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Memory => "memory",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T>(value: T, tag: &str)
    where
        T: Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug + Copy,
    {
        let encoded = serde_json::to_string(&value).expect("encode tag");
        assert_eq!(encoded, format!("\"{tag}\""));
        let decoded: T = serde_json::from_str(&encoded).expect("decode tag");
        assert_eq!(decoded, value);
    }

    #[test]
    fn ack_policy_tags_round_trip() {
        round_trip(AckPolicy::None, "none");
        round_trip(AckPolicy::All, "all");
        round_trip(AckPolicy::Explicit, "explicit");
    }

    #[test]
    fn deliver_policy_tags_round_trip() {
        round_trip(DeliverPolicy::All, "all");
        round_trip(DeliverPolicy::Last, "last");
        round_trip(DeliverPolicy::New, "new");
        round_trip(DeliverPolicy::ByStartSequence, "by_start_sequence");
        round_trip(DeliverPolicy::ByStartTime, "by_start_time");
    }

    #[test]
    fn deliver_policy_accepts_undefined_as_all() {
        let decoded: DeliverPolicy = serde_json::from_str("\"undefined\"").expect("decode alias");
        assert_eq!(decoded, DeliverPolicy::All);
    }

    #[test]
    fn replay_policy_tags_round_trip() {
        round_trip(ReplayPolicy::Instant, "instant");
        round_trip(ReplayPolicy::Original, "original");
    }

    #[test]
    fn retention_policy_tags_round_trip() {
        round_trip(RetentionPolicy::Limits, "limits");
        round_trip(RetentionPolicy::Interest, "interest");
        round_trip(RetentionPolicy::WorkQueue, "workqueue");
    }

    #[test]
    fn discard_policy_tags_round_trip() {
        round_trip(DiscardPolicy::Old, "old");
        round_trip(DiscardPolicy::New, "new");
    }

    #[test]
    fn storage_type_tags_round_trip() {
        round_trip(StorageType::File, "file");
        round_trip(StorageType::Memory, "memory");
    }

    #[test]
    fn unknown_tag_is_a_decode_error() {
        assert!(serde_json::from_str::<AckPolicy>("\"sometimes\"").is_err());
        assert!(serde_json::from_str::<StorageType>("\"tape\"").is_err());
    }
}
