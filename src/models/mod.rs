//! Wire types shared between the gateway and the upstream API.
//!
//! The upstream speaks a legacy column-name dialect (`imo_*`, `est_*`, ...)
//! alongside the newer camelCase shape; serde aliases accept both.

mod location;
mod owner;
mod property;
mod user;

pub use location::{Bairro, Cidade, Estado};
pub use owner::Owner;
pub use property::{Price, Property, PropertyDetails};
pub use user::SafeUser;

use serde::{Deserialize, Serialize};

/// Response envelope used by every upstream resource endpoint.
///
/// An HTTP 200 is not sufficient evidence of success: callers must check
/// `status == "success"` before trusting `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Human-readable failure message, falling back to the status field.
    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| self.status.clone())
    }
}

/// Result of a CEP (postal code) lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CepData {
    pub cep: String,
    #[serde(default)]
    pub logradouro: String,
    #[serde(default)]
    pub bairro: String,
    #[serde(default)]
    pub localidade: String,
    #[serde(default)]
    pub uf: String,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Identity accessor used by the generic CRUD controller.
pub trait HasId {
    fn id(&self) -> i64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_success_check() {
        let ok: Envelope = serde_json::from_str(r#"{"status":"success","data":[]}"#).unwrap();
        assert!(ok.is_success());

        let err: Envelope =
            serde_json::from_str(r#"{"status":"error","message":"nope"}"#).unwrap();
        assert!(!err.is_success());
        assert_eq!(err.failure_message(), "nope");
    }

    #[test]
    fn envelope_failure_message_falls_back_to_status() {
        let err: Envelope = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert_eq!(err.failure_message(), "error");
    }
}
