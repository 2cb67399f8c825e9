use async_trait::async_trait;

use crate::client::{ApiClient, ClientError, MultipartPayload};
use crate::models::{Envelope, Property};

use super::{parse_list, unwrap_one, ResourceService};

#[derive(Clone)]
pub struct PropertiesService {
    client: ApiClient,
}

impl PropertiesService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get_all(&self) -> Result<Vec<Property>, ClientError> {
        let resp = self.client.get_json("/admin/listar/imoveis").await?;
        parse_list(&resp)
    }

    /// Public (non-admin) listing.
    pub async fn get_public(&self) -> Result<Vec<Property>, ClientError> {
        let resp = self.client.get_json("/imoveis").await?;
        parse_list(&resp)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Property, ClientError> {
        let resp = self
            .client
            .get_json(&format!("/admin/detalhes/imovel/{id}"))
            .await?;
        Ok(serde_json::from_value(unwrap_one(&resp))?)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Property, ClientError> {
        let resp = self.client.get_json(&format!("/imoveis/{slug}")).await?;
        Ok(serde_json::from_value(unwrap_one(&resp))?)
    }

    /// Filtered public search. The primary endpoint serves filtered lists;
    /// some upstream versions only expose `/imoveis/buscar`, so that is
    /// tried when the primary call fails.
    pub async fn search(&self, params: &[(&str, String)]) -> Result<Vec<Property>, ClientError> {
        let filtered: Vec<(&str, &str)> = params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        if filtered.is_empty() {
            return self.get_public().await;
        }
        let qs = serde_urlencoded::to_string(&filtered)
            .map_err(|e| ClientError::Domain(e.to_string()))?;
        match self.client.get_json(&format!("/imoveis?{qs}")).await {
            Ok(resp) => parse_list(&resp),
            Err(_) => {
                let resp = self.client.get_json(&format!("/imoveis/buscar?{qs}")).await?;
                parse_list(&resp)
            }
        }
    }

    pub async fn create(&self, payload: &MultipartPayload) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .post_multipart("/admin/cadastrar/imovel", payload)
            .await?;
        ApiClient::expect_success(resp)
    }

    pub async fn update(&self, id: i64, payload: &MultipartPayload) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .post_multipart(&format!("/admin/editar/imovel/{id}"), payload)
            .await?;
        ApiClient::expect_success(resp)
    }

    pub async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .delete(&format!("/admin/excluir/imovel/{id}"))
            .await?;
        ApiClient::expect_success(resp)
    }
}

#[async_trait]
impl ResourceService for PropertiesService {
    type Item = Property;
    type Input = MultipartPayload;

    async fn get_all(&self) -> Result<Vec<Property>, ClientError> {
        PropertiesService::get_all(self).await
    }

    async fn create(&self, input: &MultipartPayload) -> Result<Envelope, ClientError> {
        PropertiesService::create(self, input).await
    }

    async fn update(&self, id: i64, input: &MultipartPayload) -> Result<Envelope, ClientError> {
        PropertiesService::update(self, id, input).await
    }

    async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        PropertiesService::delete(self, id).await
    }
}
