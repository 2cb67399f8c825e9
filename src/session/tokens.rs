//! Cookie names, lifetimes and the ui_user / JWT payload codecs.
//!
//! Nothing here verifies a signature. Tokens are opaque to the gateway and
//! always re-submitted upstream, which is where authorization happens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::models::SafeUser;

pub const ACCESS_COOKIE: &str = "auth_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const UI_USER_COOKIE: &str = "ui_user";
pub const CI_SESSION_COOKIE: &str = "ci_session";

pub const ACCESS_TOKEN_MAX_AGE: i64 = 60 * 15;
pub const REFRESH_TOKEN_MAX_AGE: i64 = 60 * 60 * 24 * 30;
pub const CSRF_TOKEN_MAX_AGE: i64 = 60 * 30;
pub const UI_USER_MAX_AGE: i64 = 60 * 60 * 24 * 7;
pub const CI_SESSION_MAX_AGE: i64 = 60 * 60 * 2;

/// The refresh cookie is scoped to its own route so it never rides along
/// on ordinary API calls.
pub const REFRESH_COOKIE_PATH: &str = "/api/auth/refresh";

/// Encodes the display-safe user as base64url JSON, padding stripped.
pub fn encode_ui_user(user: &SafeUser) -> String {
    // SafeUser serialization cannot fail: plain struct of strings/ints.
    let json = serde_json::to_string(user).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json.as_bytes())
}

/// Decodes a ui_user cookie value. Falls back to a plain JSON parse when
/// the value is not base64url (older cookies were URI-encoded JSON).
/// Returns `None` on any failure; never panics.
pub fn decode_ui_user(value: &str) -> Option<SafeUser> {
    if let Ok(bytes) = decode_b64url(value) {
        if let Ok(user) = serde_json::from_slice::<SafeUser>(&bytes) {
            return Some(user);
        }
    }
    serde_json::from_str(value).ok()
}

/// Extracts the payload segment of a JWT without verifying anything.
pub fn parse_jwt(token: &str) -> Option<serde_json::Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = decode_b64url(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn decode_b64url(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    // Tolerate padded input from other producers.
    URL_SAFE_NO_PAD.decode(s.trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> SafeUser {
        SafeUser {
            id: 42,
            nome: "João Silva".to_string(),
            email: "joao@example.com".to_string(),
            foto: Some("avatar.png".to_string()),
        }
    }

    #[test]
    fn ui_user_round_trip() {
        let user = sample_user();
        let encoded = encode_ui_user(&user);
        assert!(!encoded.contains('='), "padding must be stripped");
        assert_eq!(decode_ui_user(&encoded), Some(user));
    }

    #[test]
    fn decode_accepts_plain_json() {
        let raw = r#"{"id":1,"nome":"Ana","email":"a@b.c","foto":null}"#;
        let user = decode_ui_user(raw).unwrap();
        assert_eq!(user.id, 1);
    }

    #[test]
    fn decode_garbage_returns_none() {
        for garbage in ["", "!!!", "abc", "eyJ=broken", "\u{0}\u{1}"] {
            assert_eq!(decode_ui_user(garbage), None, "input: {garbage:?}");
        }
    }

    #[test]
    fn parse_jwt_extracts_payload() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"id":7,"exp":1999999999}"#);
        let token = format!("{header}.{payload}.sig");
        let claims = parse_jwt(&token).unwrap();
        assert_eq!(claims["id"], 7);
    }

    #[test]
    fn parse_jwt_rejects_malformed() {
        assert!(parse_jwt("").is_none());
        assert!(parse_jwt("onlyonesegment").is_none());
        assert!(parse_jwt("a.###.c").is_none());
    }
}
