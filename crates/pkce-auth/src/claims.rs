//! ID token decoding and claim checks
//!
//! The ID token is decoded, not verified: the signature segment is kept
//! verbatim for callers that want to verify it with the provider's JWKS,
//! but nothing here checks it.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// base64url decoder that accepts payloads with or without `=` padding.
const JWT_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// `aud` may be a single string or an array (OIDC Core §2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Single(aud) => f.write_str(aud),
            Audience::Multiple(auds) => f.write_str(&auds.join(", ")),
        }
    }
}

/// The three dot-separated segments exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSegments {
    pub header: String,
    pub payload: String,
    pub signature: String,
}

/// Claims carried by an OpenID Connect ID token.
///
/// `expires_at` and `issued_at` are unix timestamps in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(rename = "aud")]
    pub audience: Audience,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "iat")]
    pub issued_at: i64,

    // Profile claims
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub picture: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub locale: Option<String>,

    #[serde(skip)]
    pub raw: RawSegments,
}

/// Decode the payload segment of an ID token.
///
/// The token must have exactly three segments. The signature is not verified.
pub fn parse_id_token(raw: &str) -> Result<IdTokenClaims> {
    let segments: Vec<&str> = raw.split('.').collect();
    let [header, payload, signature] = segments.as_slice() else {
        return Err(Error::MalformedToken(format!(
            "expected 3 segments, got {}",
            segments.len()
        )));
    };

    let bytes = JWT_SEGMENT
        .decode(payload)
        .map_err(|e| Error::MalformedToken(format!("payload is not base64url: {e}")))?;
    let mut claims: IdTokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("payload is not a claims object: {e}")))?;

    claims.raw = RawSegments {
        header: (*header).to_owned(),
        payload: (*payload).to_owned(),
        signature: (*signature).to_owned(),
    };
    Ok(claims)
}

/// Check expiry, issuance time and audience, in that order.
///
/// Returns the first failing check. An empty `expected_audience` skips the
/// audience check. No clock-skew allowance is applied.
pub fn validate_claims(
    claims: &IdTokenClaims,
    expected_audience: &str,
    now: SystemTime,
) -> Result<()> {
    let now = unix_seconds(now);

    if claims.expires_at < now {
        return Err(Error::Expired {
            exp: claims.expires_at,
            now,
        });
    }

    if claims.issued_at > now {
        return Err(Error::IssuedInFuture {
            iat: claims.issued_at,
            now,
        });
    }

    if !expected_audience.is_empty() && !claims.audience.contains(expected_audience) {
        return Err(Error::AudienceMismatch {
            expected: expected_audience.to_owned(),
            actual: claims.audience.to_string(),
        });
    }

    Ok(())
}

fn unix_seconds(time: SystemTime) -> i64 {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    i64::try_from(secs).unwrap_or(i64::MAX)
}
