use async_trait::async_trait;

use crate::client::{ApiClient, ClientError, MultipartPayload, StagedFile};
use crate::models::{Envelope, SafeUser};

use super::{parse_list, ResourceService};

/// Back-office user form input. Photo upload makes this multipart.
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    pub usu_nome: Option<String>,
    pub usu_email: Option<String>,
    pub usu_senha: Option<String>,
    pub usu_foto: Option<StagedFile>,
}

impl UserInput {
    fn to_multipart(&self) -> MultipartPayload {
        let mut payload = MultipartPayload::default();
        if let Some(v) = &self.usu_nome {
            payload.text("usu_nome", v.clone());
        }
        if let Some(v) = &self.usu_email {
            payload.text("usu_email", v.clone());
        }
        if let Some(v) = &self.usu_senha {
            payload.text("usu_senha", v.clone());
        }
        if let Some(f) = &self.usu_foto {
            payload.file("usu_foto", f.clone());
        }
        payload
    }
}

#[derive(Clone)]
pub struct UsersService {
    client: ApiClient,
}

impl UsersService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get_all(&self) -> Result<Vec<SafeUser>, ClientError> {
        let resp = self.client.get_json("/admin/listar/usuarios").await?;
        parse_list(&resp)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<SafeUser, ClientError> {
        let resp = self
            .client
            .get_json(&format!("/admin/detalhes/usuario/{id}"))
            .await?;
        SafeUser::pick(&resp)
            .ok_or_else(|| ClientError::Domain("resposta sem id válido".to_string()))
    }

    pub async fn create(&self, input: &UserInput) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .post_multipart("/admin/cadastrar/usuario", &input.to_multipart())
            .await?;
        ApiClient::expect_success(resp)
    }

    pub async fn update(&self, id: i64, input: &UserInput) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .post_multipart(&format!("/admin/editar/usuario/{id}"), &input.to_multipart())
            .await?;
        ApiClient::expect_success(resp)
    }

    pub async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        let resp = self
            .client
            .delete(&format!("/admin/excluir/usuario/{id}"))
            .await?;
        ApiClient::expect_success(resp)
    }
}

#[async_trait]
impl ResourceService for UsersService {
    type Item = SafeUser;
    type Input = UserInput;

    async fn get_all(&self) -> Result<Vec<SafeUser>, ClientError> {
        UsersService::get_all(self).await
    }

    async fn create(&self, input: &UserInput) -> Result<Envelope, ClientError> {
        UsersService::create(self, input).await
    }

    async fn update(&self, id: i64, input: &UserInput) -> Result<Envelope, ClientError> {
        UsersService::update(self, id, input).await
    }

    async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
        UsersService::delete(self, id).await
    }
}
