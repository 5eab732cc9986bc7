//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the OAuth
//! authorization flow, plus the anti-CSRF state token. The verifier stays in
//! process memory and is sent only with the token exchange; the challenge
//! goes into the authorization URL so the provider can check that the
//! exchange request came from the party that started the flow.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Entropy behind a verifier: 32 bytes → 43 base64url characters.
const VERIFIER_BYTES: usize = 32;

/// Entropy behind a state token.
const STATE_BYTES: usize = 16;

/// RFC 7636 §4.1 length bounds.
const VERIFIER_MIN_LEN: usize = 43;
const VERIFIER_MAX_LEN: usize = 128;

/// Secret half of the PKCE pair. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeVerifier(String);

/// Public half of the PKCE pair: `BASE64URL(SHA256(verifier))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChallenge(String);

/// Opaque anti-CSRF value echoed back by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken(String);

impl CodeVerifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CodeVerifier {
    type Error = Error;

    /// Accept an externally supplied verifier if it satisfies RFC 7636:
    /// 43-128 characters from `[A-Za-z0-9-._~]`.
    fn try_from(value: String) -> Result<Self> {
        if !(VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN).contains(&value.len()) {
            return Err(Error::InvalidVerifier(format!(
                "length {} outside {VERIFIER_MIN_LEN}-{VERIFIER_MAX_LEN}",
                value.len()
            )));
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')))
        {
            return Err(Error::InvalidVerifier(format!(
                "character {c:?} is not unreserved"
            )));
        }
        Ok(Self(value))
    }
}

impl fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeVerifier([REDACTED])")
    }
}

impl CodeChallenge {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StateToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Draw `len` bytes from the OS CSPRNG and encode them as unpadded base64url.
fn random_token(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    getrandom::getrandom(&mut bytes).map_err(|e| Error::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate a cryptographically random PKCE code verifier.
///
/// 32 bytes of OS entropy encoded as URL-safe base64 without padding,
/// giving 43 characters (the RFC 7636 minimum, 256 bits of entropy).
/// Fails only if the OS entropy source fails.
pub fn generate_verifier() -> Result<CodeVerifier> {
    random_token(VERIFIER_BYTES).map(CodeVerifier)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(ASCII(verifier)))`
pub fn compute_challenge(verifier: &CodeVerifier) -> CodeChallenge {
    let hash = Sha256::digest(verifier.as_str().as_bytes());
    CodeChallenge(URL_SAFE_NO_PAD.encode(hash))
}

/// Recompute the challenge and compare. The provider does the authoritative
/// check; this is for local assertions.
pub fn verify_challenge(verifier: &CodeVerifier, challenge: &CodeChallenge) -> bool {
    compute_challenge(verifier) == *challenge
}

/// Generate a fresh state token for one authorization attempt.
pub fn generate_state() -> Result<StateToken> {
    random_token(STATE_BYTES).map(StateToken)
}
