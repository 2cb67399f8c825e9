use serde::{Deserialize, Serialize};

use super::HasId;

/// Property owner reference entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: i64,
    #[serde(rename = "prp_nome", alias = "name")]
    pub nome: String,
    #[serde(rename = "prp_documento", alias = "document", default)]
    pub documento: Option<String>,
    #[serde(rename = "prp_email", alias = "email", default)]
    pub email: Option<String>,
    #[serde(rename = "prp_telefone", alias = "phone", default)]
    pub telefone: String,
}

impl HasId for Owner {
    fn id(&self) -> i64 {
        self.id
    }
}
