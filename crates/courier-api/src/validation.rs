use chrono::{SecondsFormat, Utc};
use courier_db::Document;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Current instant as RFC 3339 UTC with millisecond precision,
/// e.g. `2026-10-18T09:30:00.123Z`. Used for display and audit only.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A fresh 128-bit random identifier.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Basic `local@domain.tld` shape check. No length or IDN rules.
pub fn validate_email(email: &str) -> bool {
    static EMAIL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));
    EMAIL.is_match(email)
}

/// Copy of a user record without its `password` attribute.
pub fn redact(user: &Document) -> Document {
    let mut redacted = user.clone();
    redacted.remove("password");
    redacted
}
