//! Wrappers around axum's extractors whose rejections render as `ApiError`
//! JSON instead of axum's plain-text bodies.

use axum::extract::{FromRequest, FromRequestParts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `deserialize_with` helper for RFC 3339 query parameters. An unencoded `+`
/// in the offset arrives as a space, so `... 01:00` is read as `...+01:00`.
pub fn query_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_query_timestamp(&raw).map(Some).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid timestamp `{}`, expected RFC 3339 such as 2026-01-31T09:30:00Z \
             (percent-encode `+` offsets as %2B)",
            raw
        ))
    })
}

fn parse_query_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let restored;
    let value = match raw.len().checked_sub(6).and_then(|i| raw.split_at_checked(i)) {
        Some((head, tail)) if tail.starts_with(' ') && is_offset(&tail[1..]) => {
            restored = format!("{}+{}", head, &tail[1..]);
            restored.as_str()
        }
        _ => raw,
    };
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `hh:mm`
fn is_offset(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 5
        && b[2] == b':'
        && [b[0], b[1], b[3], b[4]].iter().all(u8::is_ascii_digit)
}
