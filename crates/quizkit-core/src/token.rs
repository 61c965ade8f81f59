//! Bearer token freshness checks.
//!
//! Tokens are JWTs; only the payload's `exp` claim (unix seconds) is read.
//! Signatures are not verified here, the server does that. Anything that
//! cannot be decoded is treated as expired.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Decode the `exp` claim of a JWT, if it has one.
pub fn expiry_of(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload) = (parts.next()?, parts.next()?);
    // Some issuers pad the segment even though JWT forbids it.
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims.exp
}

/// True if the token is well formed and its `exp` claim is not in the past.
pub fn is_valid(token: &str, now: DateTime<Utc>) -> bool {
    match expiry_of(token) {
        Some(exp) => exp >= now.timestamp(),
        None => false,
    }
}

/// Seconds until expiry, floored at zero. Malformed tokens report zero.
pub fn remaining_seconds(token: &str, now: DateTime<Utc>) -> i64 {
    expiry_of(token)
        .map(|exp| (exp - now.timestamp()).max(0))
        .unwrap_or(0)
}

/// Check against the persisted `tokenExpiry` value (epoch milliseconds)
/// that some logins record alongside the token.
pub fn is_past_stored_expiry(expiry_ms: Option<i64>, now: DateTime<Utc>) -> bool {
    match expiry_ms {
        Some(ms) if ms > 0 => now.timestamp_millis() > ms,
        _ => false,
    }
}

/// Human-readable remaining lifetime, e.g. `"2d 3h"`, `"4h 10m"`, `"12m"`.
pub fn format_remaining(seconds: i64) -> String {
    if seconds <= 0 {
        return "expired".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Build an unsigned token with the given `exp`. Test and demo helper.
pub fn unsigned_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"1","exp":{exp}}}"#));
    format!("{header}.{payload}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn fresh_token_is_valid() {
        let token = unsigned_token(2_000);
        assert!(is_valid(&token, at(1_000)));
        assert_eq!(remaining_seconds(&token, at(1_000)), 1_000);
    }

    #[test]
    fn token_valid_through_its_expiry_second() {
        let token = unsigned_token(2_000);
        assert!(is_valid(&token, at(2_000)));
        assert!(!is_valid(&token, at(2_001)));
    }

    #[test]
    fn expired_token_reports_zero_remaining() {
        let token = unsigned_token(500);
        assert!(!is_valid(&token, at(1_000)));
        assert_eq!(remaining_seconds(&token, at(1_000)), 0);
    }

    #[test]
    fn malformed_tokens_fail_closed() {
        let now = at(1_000);
        for token in ["", "abc", "a.b.c", "a.!!!.c", "only-one-part."] {
            assert!(!is_valid(token, now), "token {token:?} should be invalid");
            assert_eq!(remaining_seconds(token, now), 0);
        }
    }

    #[test]
    fn token_without_exp_is_expired() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"1"}"#);
        let token = format!("h.{payload}.s");
        assert!(!is_valid(&token, at(0)));
    }

    #[test]
    fn padded_payload_is_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":99}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(expiry_of(&token), Some(99));
    }

    #[test]
    fn stored_expiry_check() {
        let now = at(1_000);
        assert!(is_past_stored_expiry(Some(999_000), now));
        assert!(!is_past_stored_expiry(Some(1_001_000), now));
        assert!(!is_past_stored_expiry(None, now));
        assert!(!is_past_stored_expiry(Some(0), now));
    }

    #[test]
    fn format_remaining_buckets() {
        assert_eq!(format_remaining(0), "expired");
        assert_eq!(format_remaining(-5), "expired");
        assert_eq!(format_remaining(59), "0m");
        assert_eq!(format_remaining(12 * 60), "12m");
        assert_eq!(format_remaining(4 * 3_600 + 10 * 60), "4h 10m");
        assert_eq!(format_remaining(2 * 86_400 + 3 * 3_600), "2d 3h");
    }
}
