use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-reported error carried inside a response envelope.
///
/// Its presence is fatal for the call; the description becomes the
/// surfaced error message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub description: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "unknown server error (code {})", self.code)
        } else {
            f.write_str(&self.description)
        }
    }
}

/// A response envelope: either a server error or the payload.
///
/// The error variant is tried first so an envelope carrying both an
/// `error` object and payload fields resolves to the error.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Response<T> {
    Err { error: ApiError },
    Ok(T),
}

impl<T> Response<T> {
    /// Converts the envelope into a result over the payload.
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Self::Err { error } => Err(error),
            Self::Ok(value) => Ok(value),
        }
    }
}

/// Body of delete-style responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::{ApiError, Response, SuccessResponse};

    #[test]
    fn error_envelope_decodes_to_err() {
        let raw = r#"{"type":"io.sluice.api.v1.consumer_info_response","error":{"code":404,"description":"consumer not found"}}"#;
        let resp: Response<SuccessResponse> = serde_json::from_str(raw).expect("decode envelope");
        let err = resp.into_result().expect_err("should be an error");
        assert_eq!(err.code, 404);
        assert_eq!(err.description, "consumer not found");
    }

    #[test]
    fn payload_envelope_decodes_to_ok() {
        let raw = r#"{"type":"io.sluice.api.v1.consumer_delete_response","success":true}"#;
        let resp: Response<SuccessResponse> = serde_json::from_str(raw).expect("decode envelope");
        assert!(resp.into_result().expect("should be a payload").success);
    }

    #[test]
    fn error_wins_when_both_present() {
        let raw = r#"{"error":{"code":500,"description":"boom"},"success":true}"#;
        let resp: Response<SuccessResponse> = serde_json::from_str(raw).expect("decode envelope");
        assert!(resp.into_result().is_err());
    }

    #[test]
    fn display_uses_description() {
        let err = ApiError {
            code: 404,
            description: "consumer not found".into(),
        };
        assert_eq!(err.to_string(), "consumer not found");
        let anon = ApiError {
            code: 500,
            description: String::new(),
        };
        assert_eq!(anon.to_string(), "unknown server error (code 500)");
    }
}
