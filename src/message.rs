use chrono::{DateTime, SecondsFormat, Utc};

/// Literal body used when timestamped messages are disabled.
pub const LITERAL_BODY: &str = "Changes detected";

/// Settings that shape generated commit messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStyle {
    pub prefix: String,
    pub use_timestamp: bool,
}

impl MessageStyle {
    /// Build the message for a commit created at `now`.
    ///
    /// Timestamped form: `"<prefix>: 2024-01-02T03-04-05-678Z"` (RFC 3339, millisecond
    /// precision, `:` and `.` replaced with `-` so the text is safe in ref names and filenames).
    pub fn render(&self, now: DateTime<Utc>) -> String {
        if self.use_timestamp {
            format!("{}: {}", self.prefix, sanitized_timestamp(now))
        } else {
            format!("{}: {LITERAL_BODY}", self.prefix)
        }
    }
}

fn sanitized_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}
