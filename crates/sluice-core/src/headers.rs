use std::collections::HashMap;

/// Header carrying the publish deduplication identifier.
pub const MSG_ID_HDR: &str = "Nats-Msg-Id";
/// Header asserting the stream expected to ingest the publish.
pub const EXPECTED_STREAM_HDR: &str = "Nats-Expected-Stream";
/// Header asserting the stream's expected last sequence (decimal).
pub const EXPECTED_LAST_SEQ_HDR: &str = "Nats-Expected-Last-Sequence";
/// Header asserting the stream's expected last message id.
pub const EXPECTED_LAST_MSG_ID_HDR: &str = "Nats-Expected-Last-Msg-Id";

/// Status header set on zero-payload control replies.
pub const STATUS_HDR: &str = "Status";
/// Free-form description accompanying a status reply.
pub const DESCRIPTION_HDR: &str = "Description";

/// Status value signalling that nothing is listening on the subject.
pub const STATUS_NO_RESPONDERS: &str = "503";
/// Status value signalling an empty consumer on a no-wait pull.
pub const STATUS_NO_MESSAGES: &str = "404";
/// Status value signalling an expired pull request.
pub const STATUS_REQUEST_TIMEOUT: &str = "408";

/// Case-insensitive multi-map of header names to value lists.
///
/// Lookup keys are folded to ASCII lowercase; values keep their
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn fold(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    /// Replaces all values under `name` with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.entries.insert(Self::fold(name), vec![value.into()]);
    }

    /// Appends a value under `name`, keeping existing ones.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .entry(Self::fold(name))
            .or_default()
            .push(value.into());
    }

    /// Returns the first value under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&Self::fold(name))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns all values under `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&Self::fold(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&Self::fold(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.remove(&Self::fold(name))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over (folded name, values) pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::Headers;

    #[test]
    fn get_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("Nats-Msg-Id", "abc");
        assert_eq!(headers.get("nats-msg-id"), Some("abc"));
        assert_eq!(headers.get("NATS-MSG-ID"), Some("abc"));
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn append_keeps_existing_values() {
        let mut headers = Headers::new();
        headers.append("X-Tag", "one");
        headers.append("x-tag", "two");
        assert_eq!(headers.get("X-Tag"), Some("one"));
        assert_eq!(headers.get_all("x-tag"), ["one", "two"]);
    }

    #[test]
    fn set_replaces_values() {
        let mut headers = Headers::new();
        headers.append("Status", "404");
        headers.set("status", "408");
        assert_eq!(headers.get_all("Status"), ["408"]);
    }

    #[test]
    fn remove_clears_all_values() {
        let mut headers = Headers::new();
        headers.append("a", "1");
        headers.append("A", "2");
        assert_eq!(headers.remove("a"), Some(vec!["1".into(), "2".into()]));
        assert!(headers.is_empty());
    }
}
