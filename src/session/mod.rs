//! Per-request session resolution.
//!
//! There is no server-side session store: validity is a pure function of
//! the access token's claims, recomputed on every request.

pub mod tokens;

use chrono::Utc;
use tracing::debug;

use crate::models::SafeUser;
use tokens::{decode_ui_user, parse_jwt};

/// Safety margin so a request does not race an imminent expiry.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

/// Outcome of the per-request validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionValidity {
    NoToken,
    Expired,
    Valid,
}

pub fn validity_at(token: Option<&str>, now_unix: i64) -> SessionValidity {
    let Some(token) = token else {
        return SessionValidity::NoToken;
    };
    let exp = parse_jwt(token).and_then(|claims| claims.get("exp").and_then(|v| v.as_i64()));
    match exp {
        Some(exp) if exp > now_unix + EXPIRY_MARGIN_SECS => SessionValidity::Valid,
        _ => SessionValidity::Expired,
    }
}

pub fn validity(token: Option<&str>) -> SessionValidity {
    validity_at(token, Utc::now().timestamp())
}

/// True iff the token carries a numeric `exp` more than 30s in the future.
pub fn is_access_valid(token: Option<&str>) -> bool {
    validity(token) == SessionValidity::Valid
}

/// Reads a numeric user id from common JWT claim names.
pub fn user_id_from_jwt(token: &str) -> Option<i64> {
    let claims = parse_jwt(token)?;
    ["id", "user_id", "uid", "sub"].iter().find_map(|k| {
        let v = claims.get(*k)?;
        v.as_i64().or_else(|| v.as_str()?.parse().ok())
    })
}

/// Resolves the acting user id for audit stamping.
///
/// Priority: ui_user cookie, then JWT claims, then one upstream `/auth/me`
/// round trip as last resort. A wrong id silently misattributes the
/// `usu_created`/`usu_updated` audit fields, so locally available sources
/// are preferred over the network.
pub async fn resolve_user_id(
    ui_user_cookie: Option<&str>,
    token: Option<&str>,
    upstream: &reqwest::Client,
    base_url: &str,
) -> Option<i64> {
    if let Some(raw) = ui_user_cookie {
        if let Some(user) = decode_ui_user(raw) {
            if user.id != 0 {
                return Some(user.id);
            }
        }
    }

    let token = token?;
    if let Some(id) = user_id_from_jwt(token) {
        return Some(id);
    }

    debug!("resolving audit user id via upstream /auth/me");
    let resp = upstream
        .get(format!("{}/auth/me", base_url.trim_end_matches('/')))
        .header("accept", "application/json")
        .header("accept-encoding", "identity")
        .bearer_auth(token)
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let body: serde_json::Value = resp.json().await.ok()?;
    SafeUser::pick(&body).map(|u| u.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn jwt(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        format!("{header}.{body}.x")
    }

    #[test]
    fn validity_state_machine() {
        let now = 1_700_000_000;
        assert_eq!(validity_at(None, now), SessionValidity::NoToken);

        let expired = jwt(serde_json::json!({"exp": now - 10}));
        assert_eq!(validity_at(Some(&expired), now), SessionValidity::Expired);

        let valid = jwt(serde_json::json!({"exp": now + 3600}));
        assert_eq!(validity_at(Some(&valid), now), SessionValidity::Valid);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = 1_700_000_000;
        let at_margin = jwt(serde_json::json!({"exp": now + 30}));
        assert_eq!(validity_at(Some(&at_margin), now), SessionValidity::Expired);

        let past_margin = jwt(serde_json::json!({"exp": now + 31}));
        assert_eq!(validity_at(Some(&past_margin), now), SessionValidity::Valid);
    }

    #[test]
    fn non_numeric_exp_is_invalid() {
        let now = 1_700_000_000;
        let bad = jwt(serde_json::json!({"exp": "soon"}));
        assert_eq!(validity_at(Some(&bad), now), SessionValidity::Expired);
        let none = jwt(serde_json::json!({"sub": 1}));
        assert_eq!(validity_at(Some(&none), now), SessionValidity::Expired);
    }

    #[test]
    fn jwt_id_claim_priority() {
        let t = jwt(serde_json::json!({"sub": "99", "id": 5}));
        assert_eq!(user_id_from_jwt(&t), Some(5));
        let t = jwt(serde_json::json!({"sub": "99"}));
        assert_eq!(user_id_from_jwt(&t), Some(99));
        let t = jwt(serde_json::json!({"role": "admin"}));
        assert_eq!(user_id_from_jwt(&t), None);
    }
}
