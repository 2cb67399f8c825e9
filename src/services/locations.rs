use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::client::{ApiClient, ClientError};
use crate::models::{Bairro, Cidade, Envelope, Estado};

use super::{parse_list, ResourceService};

#[derive(Debug, Clone, Serialize)]
pub struct CreateEstado {
    pub est_nome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCidade {
    pub cid_nome: String,
    pub est_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBairro {
    pub bai_nome: String,
    pub cid_id: i64,
}

struct CachedList<T> {
    fetched_at: Instant,
    items: Vec<T>,
}

/// Read-mostly cache for the three reference lists. Entries are served
/// until the staleness window elapses, then refetched on next access.
pub struct ReferenceLists {
    ttl: Duration,
    estados: Mutex<Option<CachedList<Estado>>>,
    cidades: Mutex<Option<CachedList<Cidade>>>,
    bairros: Mutex<Option<CachedList<Bairro>>>,
}

impl ReferenceLists {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            estados: Mutex::new(None),
            cidades: Mutex::new(None),
            bairros: Mutex::new(None),
        }
    }

    fn fresh<T: Clone>(&self, slot: &Mutex<Option<CachedList<T>>>) -> Option<Vec<T>> {
        let guard = slot.lock();
        guard
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.items.clone())
    }

    fn store<T: Clone>(&self, slot: &Mutex<Option<CachedList<T>>>, items: &[T]) {
        *slot.lock() = Some(CachedList {
            fetched_at: Instant::now(),
            items: items.to_vec(),
        });
    }

    fn invalidate(&self) {
        *self.estados.lock() = None;
        *self.cidades.lock() = None;
        *self.bairros.lock() = None;
    }
}

#[derive(Clone)]
pub struct LocationsService {
    client: ApiClient,
    cache: Arc<ReferenceLists>,
}

impl LocationsService {
    pub fn new(client: ApiClient, ttl: Duration) -> Self {
        Self {
            client,
            cache: Arc::new(ReferenceLists::new(ttl)),
        }
    }

    pub async fn estados(&self) -> Result<Vec<Estado>, ClientError> {
        if let Some(cached) = self.cache.fresh(&self.cache.estados) {
            debug!(count = cached.len(), "Serving estados from cache");
            return Ok(cached);
        }
        let resp = self.client.get_json("/estados").await?;
        let items: Vec<Estado> = parse_list(&resp)?;
        self.cache.store(&self.cache.estados, &items);
        Ok(items)
    }

    pub async fn cidades(&self) -> Result<Vec<Cidade>, ClientError> {
        if let Some(cached) = self.cache.fresh(&self.cache.cidades) {
            debug!(count = cached.len(), "Serving cidades from cache");
            return Ok(cached);
        }
        let resp = self.client.get_json("/cidades").await?;
        let items: Vec<Cidade> = parse_list(&resp)?;
        self.cache.store(&self.cache.cidades, &items);
        Ok(items)
    }

    pub async fn bairros(&self) -> Result<Vec<Bairro>, ClientError> {
        if let Some(cached) = self.cache.fresh(&self.cache.bairros) {
            debug!(count = cached.len(), "Serving bairros from cache");
            return Ok(cached);
        }
        let resp = self.client.get_json("/bairros").await?;
        let items: Vec<Bairro> = parse_list(&resp)?;
        self.cache.store(&self.cache.bairros, &items);
        Ok(items)
    }

    /// Scoped reads bypass the cache: they hit narrower upstream routes.
    pub async fn cidades_by_estado(&self, estado_id: i64) -> Result<Vec<Cidade>, ClientError> {
        let resp = self
            .client
            .get_json(&format!("/estados/{estado_id}/cidades"))
            .await?;
        parse_list(&resp)
    }

    pub async fn bairros_by_cidade(&self, cidade_id: i64) -> Result<Vec<Bairro>, ClientError> {
        let resp = self
            .client
            .get_json(&format!("/cidades/{cidade_id}/bairros"))
            .await?;
        parse_list(&resp)
    }

    pub async fn create_estado(&self, input: &CreateEstado) -> Result<Envelope, ClientError> {
        let resp = self.client.post_json("/admin/cadastrar/estado", input).await?;
        self.cache.invalidate();
        ApiClient::expect_success(resp)
    }

    pub async fn create_cidade(&self, input: &CreateCidade) -> Result<Envelope, ClientError> {
        let resp = self.client.post_json("/admin/cadastrar/cidade", input).await?;
        self.cache.invalidate();
        ApiClient::expect_success(resp)
    }

    pub async fn create_bairro(&self, input: &CreateBairro) -> Result<Envelope, ClientError> {
        let resp = self.client.post_json("/admin/cadastrar/bairro", input).await?;
        self.cache.invalidate();
        ApiClient::expect_success(resp)
    }

    pub async fn delete_estado(&self, id: i64) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .delete(&format!("/admin/excluir/estado/{id}"))
            .await?;
        self.cache.invalidate();
        ApiClient::expect_success(resp)
    }

    pub async fn delete_cidade(&self, id: i64) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .delete(&format!("/admin/excluir/cidade/{id}"))
            .await?;
        self.cache.invalidate();
        ApiClient::expect_success(resp)
    }

    pub async fn delete_bairro(&self, id: i64) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .delete(&format!("/admin/excluir/bairro/{id}"))
            .await?;
        self.cache.invalidate();
        ApiClient::expect_success(resp)
    }
}

fn unsupported_edit() -> ClientError {
    ClientError::Domain("edição não suportada para este recurso".to_string())
}

/// Adapters so each reference list plugs into the generic CRUD
/// controller. The upstream exposes no edit routes for locations, so
/// `update` is a domain error.
#[derive(Clone)]
pub struct EstadosResource(pub LocationsService);

#[async_trait]
impl ResourceService for EstadosResource {
    type Item = Estado;
    type Input = CreateEstado;

    async fn get_all(&self) -> Result<Vec<Estado>, ClientError> {
        self.0.estados().await
    }

    async fn create(&self, input: &CreateEstado) -> Result<Envelope, ClientError> {
        self.0.create_estado(input).await
    }

    async fn update(&self, _id: i64, _input: &CreateEstado) -> Result<Envelope, ClientError> {
        Err(unsupported_edit())
    }

    async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        self.0.delete_estado(id).await
    }
}

#[derive(Clone)]
pub struct CidadesResource(pub LocationsService);

#[async_trait]
impl ResourceService for CidadesResource {
    type Item = Cidade;
    type Input = CreateCidade;

    async fn get_all(&self) -> Result<Vec<Cidade>, ClientError> {
        self.0.cidades().await
    }

    async fn create(&self, input: &CreateCidade) -> Result<Envelope, ClientError> {
        self.0.create_cidade(input).await
    }

    async fn update(&self, _id: i64, _input: &CreateCidade) -> Result<Envelope, ClientError> {
        Err(unsupported_edit())
    }

    async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        self.0.delete_cidade(id).await
    }
}

#[derive(Clone)]
pub struct BairrosResource(pub LocationsService);

#[async_trait]
impl ResourceService for BairrosResource {
    type Item = Bairro;
    type Input = CreateBairro;

    async fn get_all(&self) -> Result<Vec<Bairro>, ClientError> {
        self.0.bairros().await
    }

    async fn create(&self, input: &CreateBairro) -> Result<Envelope, ClientError> {
        self.0.create_bairro(input).await
    }

    async fn update(&self, _id: i64, _input: &CreateBairro) -> Result<Envelope, ClientError> {
        Err(unsupported_edit())
    }

    async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        self.0.delete_bairro(id).await
    }
}
