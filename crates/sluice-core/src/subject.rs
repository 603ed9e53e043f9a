use uuid::Uuid;

/// Prefix of freshly minted reply subjects.
pub const INBOX_PREFIX: &str = "_INBOX.";

/// Mints a fresh, ephemeral reply subject.
pub fn new_inbox() -> String {
    format!("{INBOX_PREFIX}{}", Uuid::new_v4().simple())
}

/// Returns true when `subject` is a well-formed dot-separated subject:
/// non-empty tokens with no whitespace.
pub fn is_valid_subject(subject: &str) -> bool {
    !subject.is_empty()
        && subject
            .split('.')
            .all(|token| !token.is_empty() && !token.contains(char::is_whitespace))
}

/// Returns true when a subscription `pattern` matches a concrete
/// `subject`. `*` matches exactly one token; `>` matches one or more
/// trailing tokens.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');
    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (None, None) => return true,
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            _ => return false,
        }
    }
}
