use async_trait::async_trait;
use serde::Serialize;

use crate::client::{ApiClient, ClientError};
use crate::models::{Envelope, Owner};

use super::{parse_list, ResourceService};

#[derive(Debug, Clone, Default, Serialize)]
pub struct OwnerInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prp_nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prp_documento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prp_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prp_telefone: Option<String>,
}

#[derive(Clone)]
pub struct OwnersService {
    client: ApiClient,
}

impl OwnersService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get_all(&self) -> Result<Vec<Owner>, ClientError> {
        let resp = self.client.get_json("/admin/listar/proprietarios").await?;
        let owners: Vec<Owner> = parse_list(&resp)?;
        Ok(owners.into_iter().filter(|o| o.id > 0).collect())
    }

    /// Remote name/document search, used when the full list is too large
    /// to filter locally.
    pub async fn search(&self, query: &str) -> Result<Vec<Owner>, ClientError> {
        let qs = serde_urlencoded::to_string([("q", query)])
            .map_err(|e| ClientError::Domain(e.to_string()))?;
        let resp = self
            .client
            .get_json(&format!("/admin/buscar/proprietarios?{qs}"))
            .await?;
        let owners: Vec<Owner> = parse_list(&resp)?;
        Ok(owners.into_iter().filter(|o| o.id > 0).collect())
    }

    pub async fn create(&self, input: &OwnerInput) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .post_json("/admin/cadastrar/proprietario", input)
            .await?;
        ApiClient::expect_success(resp)
    }

    pub async fn update(&self, id: i64, input: &OwnerInput) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .post_json(&format!("/admin/editar/proprietario/{id}"), input)
            .await?;
        ApiClient::expect_success(resp)
    }

    pub async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .delete(&format!("/admin/excluir/proprietario/{id}"))
            .await?;
        ApiClient::expect_success(resp)
    }
}

#[async_trait]
impl ResourceService for OwnersService {
    type Item = Owner;
    type Input = OwnerInput;

    async fn get_all(&self) -> Result<Vec<Owner>, ClientError> {
        OwnersService::get_all(self).await
    }

    async fn create(&self, input: &OwnerInput) -> Result<Envelope, ClientError> {
        OwnersService::create(self, input).await
    }

    async fn update(&self, id: i64, input: &OwnerInput) -> Result<Envelope, ClientError> {
        OwnersService::update(self, id, input).await
    }

    async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        OwnersService::delete(self, id).await
    }
}
