use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{AckPolicy, DeliverPolicy, ReplayPolicy};
use crate::ser::{is_false, is_zero_i64, is_zero_u64, is_zero_usize, nanos, opt_nanos};

/// Server-side consumer configuration.
///
/// Field encodings mirror the management API: durations are integer
/// nanoseconds, empty strings and zero counts are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(
        default,
        rename = "durable_name",
        skip_serializing_if = "String::is_empty"
    )]
    pub durable: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deliver_subject: String,
    pub deliver_policy: DeliverPolicy,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub opt_start_seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_start_time: Option<DateTime<Utc>>,
    pub ack_policy: AckPolicy,
    #[serde(default, with = "opt_nanos", skip_serializing_if = "Option::is_none")]
    pub ack_wait: Option<Duration>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub max_deliver: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filter_subject: String,
    pub replay_policy: ReplayPolicy,
    #[serde(
        default,
        rename = "rate_limit_bps",
        skip_serializing_if = "is_zero_u64"
    )]
    pub rate_limit: u64,
    #[serde(default, rename = "sample_freq", skip_serializing_if = "String::is_empty")]
    pub sample_frequency: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub max_waiting: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub max_ack_pending: i64,
}

/// Consumer and stream sequence positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePair {
    #[serde(rename = "consumer_seq")]
    pub consumer: u64,
    #[serde(rename = "stream_seq")]
    pub stream: u64,
}

/// Cluster placement details for a consumer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replicas: Vec<PeerInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub name: String,
    pub current: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub offline: bool,
    #[serde(with = "nanos")]
    pub active: Duration,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub lag: u64,
}

/// Full server-side view of a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    #[serde(rename = "stream_name")]
    pub stream: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub config: ConsumerConfig,
    #[serde(default)]
    pub delivered: SequencePair,
    #[serde(default)]
    pub ack_floor: SequencePair,
    #[serde(default)]
    pub num_ack_pending: i64,
    #[serde(default)]
    pub num_redelivered: i64,
    #[serde(default)]
    pub num_waiting: i64,
    #[serde(default)]
    pub num_pending: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterInfo>,
}

/// Body of a consumer-create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsumerRequest {
    #[serde(rename = "stream_name")]
    pub stream: String,
    pub config: ConsumerConfig,
}

/// Body of a pull next-message request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextRequest {
    #[serde(default, with = "opt_nanos", skip_serializing_if = "Option::is_none")]
    pub expires: Option<Duration>,
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub batch: usize,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_wait: bool,
}
