use serde::{Deserialize, Serialize};

/// Account-level streaming usage and limits, returned by the
/// account-info probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub storage: u64,
    #[serde(default)]
    pub streams: u64,
    #[serde(default)]
    pub consumers: u64,
    #[serde(default)]
    pub limits: AccountLimits,
    #[serde(default)]
    pub api: ApiStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    #[serde(default)]
    pub max_memory: i64,
    #[serde(default)]
    pub max_storage: i64,
    #[serde(default)]
    pub max_streams: i64,
    #[serde(default)]
    pub max_consumers: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::AccountInfo;
    use crate::envelope::Response;

    #[test]
    fn decodes_usage_and_limits() {
        let raw = r#"{"memory":128,"storage":4096,"streams":2,"consumers":5,
            "limits":{"max_memory":-1,"max_storage":-1,"max_streams":10,"max_consumers":100},
            "api":{"total":42,"errors":1}}"#;
        let resp: Response<AccountInfo> = serde_json::from_str(raw).expect("decode account info");
        let info = resp.into_result().expect("payload");
        assert_eq!(info.storage, 4096);
        assert_eq!(info.streams, 2);
        assert_eq!(info.limits.max_streams, 10);
        assert_eq!(info.api.total, 42);
    }
}
