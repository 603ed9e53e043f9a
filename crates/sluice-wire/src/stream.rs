use serde::{Deserialize, Serialize};

use crate::ser::is_zero_i64;

/// Acknowledgment of a server-persisted publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubAck {
    /// Stream that ingested the message; non-empty on success.
    pub stream: String,
    /// Sequence the message was assigned in the stream.
    #[serde(default)]
    pub seq: u64,
    /// True when the server recognized the message id and suppressed
    /// the write.
    #[serde(default, skip_serializing_if = "crate::ser::is_false")]
    pub duplicate: bool,
}

/// Body of a stream-lookup-by-subject request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamNamesRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
}

/// Body of a stream-lookup response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamNames {
    /// Matching stream names; the server sends null for none.
    #[serde(default)]
    pub streams: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub total: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub offset: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::{PubAck, StreamNames, StreamNamesRequest};
    use crate::envelope::Response;

    #[test]
    fn pub_ack_decodes_success_and_duplicate() {
        let resp: Response<PubAck> =
            serde_json::from_str(r#"{"stream":"FOO","seq":1}"#).expect("decode ack");
        let ack = resp.into_result().expect("payload");
        assert_eq!(ack.stream, "FOO");
        assert_eq!(ack.seq, 1);
        assert!(!ack.duplicate);

        let resp: Response<PubAck> =
            serde_json::from_str(r#"{"stream":"FOO","seq":1,"duplicate":true}"#)
                .expect("decode ack");
        assert!(resp.into_result().expect("payload").duplicate);
    }

    #[test]
    fn pub_ack_error_envelope_is_fatal() {
        let raw = r#"{"error":{"code":400,"description":"wrong last sequence: 3"}}"#;
        let resp: Response<PubAck> = serde_json::from_str(raw).expect("decode envelope");
        let err = resp.into_result().expect_err("error envelope");
        assert_eq!(err.description, "wrong last sequence: 3");
    }

    #[test]
    fn stream_names_request_carries_subject() {
        let req = StreamNamesRequest {
            subject: "ORDERS.new".into(),
        };
        assert_eq!(
            serde_json::to_string(&req).expect("encode"),
            r#"{"subject":"ORDERS.new"}"#
        );
    }

    #[test]
    fn stream_names_response_tolerates_null() {
        let names: StreamNames = serde_json::from_str(r#"{"streams":null}"#).expect("decode");
        assert!(names.streams.is_none());
        let names: StreamNames =
            serde_json::from_str(r#"{"streams":["ORDERS"],"total":1}"#).expect("decode");
        assert_eq!(names.streams.as_deref(), Some(["ORDERS".to_string()].as_slice()));
    }
}
