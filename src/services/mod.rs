//! Typed resource services over the gateway client.
//!
//! Each admin resource exposes `get_all`/`create`/`update`/`delete`
//! returning the upstream envelope; the generic CRUD controller drives
//! any of them through the [`ResourceService`] trait.

mod cep;
mod locations;
mod owners;
mod properties;
mod users;

pub use cep::{format_cep, validate_format, CepService};
pub use locations::{
    BairrosResource, CidadesResource, CreateBairro, CreateCidade, CreateEstado, EstadosResource,
    LocationsService, ReferenceLists,
};
pub use owners::{OwnerInput, OwnersService};
pub use properties::PropertiesService;
pub use users::{UserInput, UsersService};

use async_trait::async_trait;

use crate::client::ClientError;
use crate::models::{Envelope, HasId};

/// Uniform CRUD surface consumed by the admin controller.
#[async_trait]
pub trait ResourceService: Send + Sync {
    type Item: HasId + Clone + Send + Sync;
    type Input: Send + Sync;

    async fn get_all(&self) -> Result<Vec<Self::Item>, ClientError>;
    async fn create(&self, input: &Self::Input) -> Result<Envelope, ClientError>;
    async fn update(&self, id: i64, input: &Self::Input) -> Result<Envelope, ClientError>;
    async fn delete(&self, id: i64) -> Result<Envelope, ClientError>;
}

/// Pulls a list out of the tolerated response shapes: an envelope with
/// `data`, a bare array, or `{items: [...]}`. Anything else is empty.
pub(crate) fn unwrap_many(resp: &serde_json::Value) -> Vec<serde_json::Value> {
    let payload = resp.get("data").unwrap_or(resp);
    if let Some(arr) = payload.as_array() {
        return arr.clone();
    }
    if let Some(arr) = payload.get("items").and_then(|v| v.as_array()) {
        return arr.clone();
    }
    Vec::new()
}

/// Single-item variant of [`unwrap_many`].
pub(crate) fn unwrap_one(resp: &serde_json::Value) -> serde_json::Value {
    let payload = resp.get("data").unwrap_or(resp);
    if let Some(arr) = payload.as_array() {
        return arr.first().cloned().unwrap_or(serde_json::Value::Null);
    }
    payload.clone()
}

pub(crate) fn parse_list<T: serde::de::DeserializeOwned>(
    resp: &serde_json::Value,
) -> Result<Vec<T>, ClientError> {
    unwrap_many(resp)
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(ClientError::from))
        .collect()
}
