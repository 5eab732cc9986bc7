//! Human-readable summary of a completed authorization

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use pkce_auth::{AuthorizedSession, IdTokenClaims, TokenResponse};

/// Tokens longer than this are shortened before printing.
const TOKEN_DISPLAY_MAX: usize = 20;

/// Characters kept from the end of a shortened token.
const TOKEN_DISPLAY_TAIL: usize = 10;

/// Render tokens and claims for stdout. Token values are truncated.
pub fn format_session(session: &AuthorizedSession) -> String {
    let mut out = String::new();
    out.push_str("\n=== OAuth2 Token Information ===\n\n");
    write_tokens(&mut out, &session.tokens);
    if let Some(claims) = &session.claims {
        write_claims(&mut out, claims);
    }
    out
}

fn write_tokens(out: &mut String, tokens: &TokenResponse) {
    let _ = writeln!(out, "Access Token:");
    let _ = writeln!(out, "  Type: {}", tokens.token_type);
    let _ = writeln!(out, "  Expires In: {} seconds", tokens.expires_in);
    let _ = writeln!(out, "  Token: {}\n", truncate_token(&tokens.access_token));

    if let Some(refresh) = &tokens.refresh_token {
        let _ = writeln!(out, "Refresh Token: {}\n", truncate_token(refresh));
    }

    let scopes = tokens.granted_scopes();
    if !scopes.is_empty() {
        let _ = writeln!(out, "Granted Scopes: {}\n", scopes.join(" "));
    }
}

fn write_claims(out: &mut String, claims: &IdTokenClaims) {
    let _ = writeln!(out, "ID Token Claims:");
    let _ = writeln!(out, "  Subject (sub): {}", claims.subject);
    let _ = writeln!(out, "  Issuer (iss): {}", claims.issuer);
    let _ = writeln!(out, "  Audience (aud): {}", claims.audience);
    let _ = writeln!(out, "  Issued At (iat): {}", format_unix_time(claims.issued_at));
    let _ = writeln!(out, "  Expiration (exp): {}", format_unix_time(claims.expires_at));

    let profile = [
        ("Name", claims.name.as_deref()),
        ("Email", claims.email.as_deref()),
        ("Picture", claims.picture.as_deref()),
        ("Given Name", claims.given_name.as_deref()),
        ("Family Name", claims.family_name.as_deref()),
        ("Locale", claims.locale.as_deref()),
    ];
    if profile.iter().all(|(_, v)| v.is_none()) {
        return;
    }

    let _ = writeln!(out, "\nUser Information:");
    for (label, value) in profile {
        if let Some(value) = value {
            let _ = writeln!(out, "  {label}: {value}");
        }
        if label == "Email" && claims.email.is_some() {
            let verified = claims.email_verified.unwrap_or(false);
            let _ = writeln!(out, "  Email Verified: {verified}");
        }
    }
}

/// First 20 characters, `...`, last 10. Short tokens are shown whole.
pub fn truncate_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= TOKEN_DISPLAY_MAX {
        return token.to_string();
    }
    let head: String = chars[..TOKEN_DISPLAY_MAX].iter().collect();
    let tail: String = chars[chars.len() - TOKEN_DISPLAY_TAIL..].iter().collect();
    format!("{head}...{tail}")
}

/// RFC 3339 in UTC; falls back to the raw number when out of range.
pub fn format_unix_time(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkce_auth::Audience;
    use pkce_auth::claims::RawSegments;

    fn tokens() -> TokenResponse {
        TokenResponse {
            access_token: "ya29.a0AfH6SMBxABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".into(),
            token_type: "Bearer".into(),
            expires_in: 3599,
            refresh_token: Some("1//0gLmNoPqRsTuVwXyZ-abcdefghijklmnop".into()),
            id_token: None,
            scope: Some("openid email".into()),
        }
    }

    fn claims() -> IdTokenClaims {
        IdTokenClaims {
            issuer: "https://accounts.google.com".into(),
            subject: "110169484474386276334".into(),
            audience: Audience::Single("1234.apps.googleusercontent.com".into()),
            expires_at: 1_234_567_890,
            issued_at: 1_234_564_290,
            name: Some("Ada Lovelace".into()),
            email: Some("ada@example.com".into()),
            email_verified: Some(true),
            picture: None,
            given_name: None,
            family_name: None,
            locale: Some("en".into()),
            raw: RawSegments::default(),
        }
    }

    #[test]
    fn short_tokens_are_not_truncated() {
        assert_eq!(truncate_token("short"), "short");
        assert_eq!(truncate_token(&"a".repeat(20)), "a".repeat(20));
    }

    #[test]
    fn long_tokens_keep_head_and_tail() {
        let token = "abcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(truncate_token(token), "abcdefghijklmnopqrst...0123456789");
    }

    #[test]
    fn unix_time_renders_as_rfc3339() {
        assert_eq!(format_unix_time(1_234_567_890), "2009-02-13T23:31:30Z");
        assert_eq!(format_unix_time(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn summary_never_prints_full_tokens() {
        let session = AuthorizedSession {
            tokens: tokens(),
            claims: None,
        };
        let out = format_session(&session);

        assert!(out.contains("Type: Bearer"));
        assert!(out.contains("Expires In: 3599 seconds"));
        assert!(out.contains("Granted Scopes: openid email"));
        assert!(out.contains("Refresh Token: 1//0gLmNoPqRsTuVwXyZ..."));
        assert!(!out.contains(&session.tokens.access_token));
        assert!(!out.contains("ID Token Claims"));
    }

    #[test]
    fn summary_includes_claims_and_profile() {
        let session = AuthorizedSession {
            tokens: tokens(),
            claims: Some(claims()),
        };
        let out = format_session(&session);

        assert!(out.contains("Subject (sub): 110169484474386276334"));
        assert!(out.contains("Audience (aud): 1234.apps.googleusercontent.com"));
        assert!(out.contains("Expiration (exp): 2009-02-13T23:31:30Z"));
        assert!(out.contains("Name: Ada Lovelace"));
        assert!(out.contains("Email: ada@example.com"));
        assert!(out.contains("Email Verified: true"));
        assert!(out.contains("Locale: en"));
        assert!(!out.contains("Picture:"));
    }

    #[test]
    fn summary_skips_empty_profile_section() {
        let mut bare = claims();
        bare.name = None;
        bare.email = None;
        bare.locale = None;
        let out = format_session(&AuthorizedSession {
            tokens: tokens(),
            claims: Some(bare),
        });
        assert!(!out.contains("User Information"));
    }
}
