//! Absolute/relative time conversion.
//!
//! Every absolute timestamp in a request is collapsed into seconds since a
//! per-request planning epoch so the solver works with small non-negative
//! integers; every timestamp in a response is expanded back to ISO-8601 UTC.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid ISO-8601 timestamp '{value}': {source}")]
pub struct TimestampError {
    pub value: String,
    #[source]
    pub source: chrono::ParseError,
}

/// Parse an ISO-8601 timestamp into Unix seconds (UTC). Accepts a trailing
/// `Z` as well as any explicit offset.
pub fn parse_timestamp(value: &str) -> Result<i64, TimestampError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc).timestamp())
        .map_err(|source| TimestampError {
            value: value.to_string(),
            source,
        })
}

/// Format Unix seconds as ISO-8601 UTC with a trailing `Z`.
pub fn format_timestamp(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is representable"))
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}
