// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp and row mapping helpers shared by the query modules.

use chrono::{DateTime, SecondsFormat, Utc};

/// Serialize a timestamp the way every table stores it: RFC 3339 with
/// millisecond precision and a `Z` suffix, lexicographically sortable.
pub fn to_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp back. Malformed rows surface as a column
/// conversion error rather than a panic.
pub fn from_ts(s: &str, col: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                col,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_roundtrip() {
        let now = Utc::now();
        let s = to_ts(now);
        let parsed = from_ts(&s, 0).unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
        assert!(s.ends_with('Z'));
    }
}
