use serde::{Deserialize, Serialize};

/// Display-safe user fields mirrored into the readable `ui_user` cookie.
///
/// Never carries a token; this struct exists so the UI can render a name
/// and avatar without a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeUser {
    #[serde(default)]
    pub id: i64,
    #[serde(default, alias = "name")]
    pub nome: String,
    #[serde(default, alias = "mail")]
    pub email: String,
    #[serde(default, alias = "photo", alias = "picture")]
    pub foto: Option<String>,
}

impl SafeUser {
    /// Extracts the safe display fields from an arbitrary upstream payload.
    ///
    /// Upstream responses nest the user under `user` or inline it, and use
    /// several id claim names. Returns `None` when no numeric id is found.
    pub fn pick(raw: &serde_json::Value) -> Option<Self> {
        let user = raw.get("user").unwrap_or(raw);
        let id = ["id", "user_id", "usu_id", "sub", "uid"]
            .iter()
            .find_map(|k| coerce_i64(user.get(*k)))
            .or_else(|| coerce_i64(raw.get("id")))?;
        if id == 0 {
            return None;
        }

        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| user.get(*k).and_then(|v| v.as_str()))
                .unwrap_or("")
                .to_string()
        };

        Some(Self {
            id,
            nome: text(&["nome", "name", "usu_nome"]),
            email: text(&["email", "mail", "usu_email"]),
            foto: ["foto", "photo", "picture"]
                .iter()
                .find_map(|k| user.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string),
        })
    }
}

fn coerce_i64(v: Option<&serde_json::Value>) -> Option<i64> {
    match v? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl super::HasId for SafeUser {
    fn id(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_nested_user() {
        let raw = json!({"user": {"id": 4, "nome": "Ana", "email": "a@b.c", "foto": null}});
        let u = SafeUser::pick(&raw).unwrap();
        assert_eq!(u.id, 4);
        assert_eq!(u.nome, "Ana");
        assert_eq!(u.foto, None);
    }

    #[test]
    fn picks_jwt_claim_shapes() {
        let raw = json!({"sub": "9", "name": "Bia"});
        let u = SafeUser::pick(&raw).unwrap();
        assert_eq!(u.id, 9);
        assert_eq!(u.nome, "Bia");
    }

    #[test]
    fn rejects_missing_or_zero_id() {
        assert!(SafeUser::pick(&json!({"nome": "x"})).is_none());
        assert!(SafeUser::pick(&json!({"id": 0})).is_none());
    }
}
