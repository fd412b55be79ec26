//! Bearer token claim decoding.
//!
//! Tokens issued by the backend are JWTs: `header.payload.signature`, with the
//! payload a base64url-encoded JSON object. This module reads the payload to
//! learn who the token belongs to and which role it carries.
//!
//! **The signature is never verified.** Decoded claims are used for display
//! and routing only. The backend checks the token on every protected call and
//! remains the only authority on whether it is genuine.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::session::Role;

/// Number of `.`-separated segments in a well-formed token
const TOKEN_SEGMENTS: usize = 3;

/// base64url that accepts the payload with or without trailing `=` padding
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed token: expected 3 segments, found {0}")]
    SegmentCount(usize),

    #[error("Malformed token: payload is not valid base64url")]
    Base64,

    #[error("Malformed token: payload is not a JSON object")]
    Json,

    #[error("Malformed token: missing claim '{0}'")]
    MissingClaim(&'static str),

    #[error("Malformed token: unknown role '{0}'")]
    UnknownRole(String),

    #[error("Malformed token: expiry {0} is out of range")]
    InvalidExpiry(i64),
}

/// Claims read out of a token payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub identity: String,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Claims {
    /// Tokens without an `exp` claim never expire on the client side.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default, alias = "subject")]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Decode the claims of a bearer token without checking its signature.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != TOKEN_SEGMENTS {
        return Err(DecodeError::SegmentCount(segments.len()));
    }

    let payload = PAYLOAD_ENGINE
        .decode(segments[1])
        .map_err(|_| DecodeError::Base64)?;
    let raw: RawClaims = serde_json::from_slice(&payload).map_err(|_| DecodeError::Json)?;

    let identity = raw
        .sub
        .filter(|s| !s.trim().is_empty())
        .ok_or(DecodeError::MissingClaim("sub"))?;
    let role_claim = raw.role.ok_or(DecodeError::MissingClaim("role"))?;
    let role = role_claim
        .parse::<Role>()
        .map_err(|_| DecodeError::UnknownRole(role_claim.clone()))?;

    let expires_at = match raw.exp {
        Some(exp) => Some(DateTime::from_timestamp(exp, 0).ok_or(DecodeError::InvalidExpiry(exp))?),
        None => None,
    };

    Ok(Claims {
        identity,
        role,
        expires_at,
    })
}

/// Build an unsigned token carrying the given payload.
/// Only used to fabricate backend responses in tests.
#[cfg(test)]
pub(crate) fn encode_unsigned(payload: &serde_json::Value) -> String {
    let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_decode_student_token() {
        let token = encode_unsigned(&json!({"sub": "a@x.com", "role": "student"}));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.identity, "a@x.com");
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.expires_at, None);
    }

    #[test]
    fn test_decode_accepts_subject_alias_and_extra_claims() {
        let token = encode_unsigned(&json!({
            "subject": "hr@corp.io",
            "role": "Recruiter",
            "iat": 1700000000,
            "token_type": "bearer"
        }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.identity, "hr@corp.io");
        assert_eq!(claims.role, Role::Recruiter);
    }

    #[test]
    fn test_decode_padded_payload() {
        let payload = json!({"sub": "ab@x.com", "role": "student"}).to_string();
        let padded = base64::engine::general_purpose::URL_SAFE.encode(payload);
        let token = format!("h.{}.s", padded);
        assert_eq!(decode(&token).unwrap().identity, "ab@x.com");
    }

    #[test]
    fn test_decode_reads_expiry() {
        let token = encode_unsigned(&json!({"sub": "a@x.com", "role": "student", "exp": 1700000000}));
        let claims = decode(&token).unwrap();
        let exp = claims.expires_at.unwrap();
        assert_eq!(exp.timestamp(), 1700000000);
        assert!(claims.is_expired_at(exp));
        assert!(!claims.is_expired_at(exp - Duration::seconds(1)));
    }

    #[test]
    fn test_decode_wrong_segment_count() {
        assert_eq!(decode("abc"), Err(DecodeError::SegmentCount(1)));
        assert_eq!(decode("a.b"), Err(DecodeError::SegmentCount(2)));
        assert_eq!(decode("a.b.c.d"), Err(DecodeError::SegmentCount(4)));
        assert_eq!(decode(""), Err(DecodeError::SegmentCount(1)));
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert_eq!(decode("h.!!!not-base64!!!.s"), Err(DecodeError::Base64));
    }

    #[test]
    fn test_decode_invalid_json() {
        let body = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("not json");
        assert_eq!(decode(&format!("h.{}.s", body)), Err(DecodeError::Json));
    }

    #[test]
    fn test_decode_missing_claims() {
        let no_role = encode_unsigned(&json!({"sub": "a@x.com"}));
        assert_eq!(decode(&no_role), Err(DecodeError::MissingClaim("role")));

        let no_sub = encode_unsigned(&json!({"role": "student"}));
        assert_eq!(decode(&no_sub), Err(DecodeError::MissingClaim("sub")));

        let empty_sub = encode_unsigned(&json!({"sub": "  ", "role": "student"}));
        assert_eq!(decode(&empty_sub), Err(DecodeError::MissingClaim("sub")));
    }

    #[test]
    fn test_decode_unknown_role() {
        let token = encode_unsigned(&json!({"sub": "a@x.com", "role": "admin"}));
        assert_eq!(decode(&token), Err(DecodeError::UnknownRole("admin".to_string())));
    }

    #[test]
    fn test_decode_out_of_range_expiry() {
        let token = encode_unsigned(&json!({"sub": "a@x.com", "role": "student", "exp": i64::MAX}));
        assert_eq!(decode(&token), Err(DecodeError::InvalidExpiry(i64::MAX)));
    }
}
