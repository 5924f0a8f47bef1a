//! Secret scrubbing for audit metadata and error messages

use regex::Regex;
use shared::{Metadata, MetadataValue};
use std::sync::OnceLock;

/// Replacement for scrubbed values
pub const REDACTED: &str = "[REDACTED]";

const MAX_MESSAGE_CHARS: usize = 500;

/// Key fragments (lowercase, separators removed) treated as secret
const SECRET_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "authorization",
    "apikey",
    "privatekey",
    "cardnumber",
    "cvv",
    "cvc",
    "ssn",
    "cookie",
];

fn is_secret_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    SECRET_KEY_FRAGMENTS.iter().any(|f| normalized.contains(f))
}

/// Replace values under secret-looking keys, recursively
pub fn redact_metadata(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .map(|(key, value)| {
            let value = if is_secret_key(&key) {
                MetadataValue::Text(REDACTED.to_string())
            } else {
                match value {
                    MetadataValue::Map(inner) => MetadataValue::Map(redact_metadata(inner)),
                    other => other,
                }
            };
            (key, value)
        })
        .collect()
}

fn bearer_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b(bearer|basic)\s+[A-Za-z0-9._~+/=-]+").ok())
        .as_ref()
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").ok())
        .as_ref()
}

/// Make an error message safe to persist: mask credentials and email
/// addresses, drop control characters, cap the length.
pub fn sanitize_error_message(message: &str) -> String {
    let mut text: String = message
        .chars()
        .map(|c| if c == '\n' || c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();

    if let Some(re) = bearer_pattern() {
        text = re.replace_all(&text, format!("$1 {}", REDACTED).as_str()).into_owned();
    }
    if let Some(re) = email_pattern() {
        text = re.replace_all(&text, "[EMAIL]").into_owned();
    }

    let text = text.trim();
    if text.chars().count() > MAX_MESSAGE_CHARS {
        let truncated: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{}…", truncated)
    } else {
        text.to_string()
    }
}
