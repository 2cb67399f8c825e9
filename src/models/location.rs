use serde::{Deserialize, Serialize};

use super::HasId;

fn de_opt_i64<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Upstream serializes foreign keys as numbers, digit strings or "".
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Text(String),
        Null,
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Num(n) => Some(n),
        Raw::Text(s) => s.trim().parse().ok(),
        Raw::Null => None,
    })
}

/// State (UF) reference entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estado {
    pub id: i64,
    #[serde(rename = "est_nome", alias = "name")]
    pub nome: String,
    #[serde(rename = "est_slug", alias = "slug", default)]
    pub slug: String,
}

/// City reference entity. Carries the parent state both by id and by name;
/// the name is the fuzzy-reconciliation key used when ids are absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cidade {
    pub id: i64,
    #[serde(rename = "cid_nome", alias = "name")]
    pub nome: String,
    #[serde(rename = "cid_slug", alias = "slug", default)]
    pub slug: String,
    #[serde(rename = "est_id", alias = "stateId", default, deserialize_with = "de_opt_i64")]
    pub estado_id: Option<i64>,
    #[serde(rename = "est_nome", alias = "stateName", default)]
    pub estado_nome: Option<String>,
}

/// Neighborhood reference entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bairro {
    pub id: i64,
    #[serde(rename = "bai_nome", alias = "name")]
    pub nome: String,
    #[serde(rename = "bai_slug", alias = "slug", default)]
    pub slug: String,
    #[serde(rename = "cid_id", alias = "cityId", default, deserialize_with = "de_opt_i64")]
    pub cidade_id: Option<i64>,
    #[serde(rename = "cid_nome", alias = "cityName", default)]
    pub cidade_nome: Option<String>,
    #[serde(rename = "est_id", alias = "stateId", default, deserialize_with = "de_opt_i64")]
    pub estado_id: Option<i64>,
    #[serde(rename = "est_nome", alias = "stateName", default)]
    pub estado_nome: Option<String>,
}

impl HasId for Estado {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for Cidade {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for Bairro {
    fn id(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidade_accepts_string_foreign_key() {
        let c: Cidade = serde_json::from_str(
            r#"{"id":3,"cid_nome":"Varginha","cid_slug":"varginha","est_id":"12","est_nome":"Minas Gerais"}"#,
        )
        .unwrap();
        assert_eq!(c.estado_id, Some(12));
    }

    #[test]
    fn bairro_tolerates_empty_fk() {
        let b: Bairro =
            serde_json::from_str(r#"{"id":7,"bai_nome":"Centro","bai_slug":"centro","cid_id":""}"#)
                .unwrap();
        assert_eq!(b.cidade_id, None);
        assert_eq!(b.cidade_nome, None);
    }
}
