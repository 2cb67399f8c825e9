//! Gateway endpoint for Brazilian postal-code lookups.
//!
//! The CEP provider returns only the two-letter UF; the reference lists
//! carry full state names, so the lookup maps UF to the full name before
//! answering.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::api::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CepQuery {
    #[serde(default)]
    cep: String,
}

fn uf_to_estado(uf: &str) -> Option<&'static str> {
    Some(match uf {
        "AC" => "Acre",
        "AL" => "Alagoas",
        "AP" => "Amapá",
        "AM" => "Amazonas",
        "BA" => "Bahia",
        "CE" => "Ceará",
        "DF" => "Distrito Federal",
        "ES" => "Espírito Santo",
        "GO" => "Goiás",
        "MA" => "Maranhão",
        "MT" => "Mato Grosso",
        "MS" => "Mato Grosso do Sul",
        "MG" => "Minas Gerais",
        "PA" => "Pará",
        "PB" => "Paraíba",
        "PR" => "Paraná",
        "PE" => "Pernambuco",
        "PI" => "Piauí",
        "RJ" => "Rio de Janeiro",
        "RN" => "Rio Grande do Norte",
        "RS" => "Rio Grande do Sul",
        "RO" => "Rondônia",
        "RR" => "Roraima",
        "SC" => "Santa Catarina",
        "SP" => "São Paulo",
        "SE" => "Sergipe",
        "TO" => "Tocantins",
        _ => return None,
    })
}

/// GET /api/cep?cep=XXXXXXXX
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CepQuery>,
) -> Result<Response, ApiError> {
    let cep: String = query.cep.chars().filter(char::is_ascii_digit).collect();
    if cep.len() != 8 {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "CEP inválido" })),
        )
            .into_response());
    }

    let base = state.config.upstream.cep_base_url.trim_end_matches('/');
    let resp = state
        .upstream
        .get(format!("{base}/{cep}/json/"))
        .send()
        .await?;
    if !resp.status().is_success() {
        let status = StatusCode::from_u16(resp.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        return Ok((
            status,
            Json(json!({ "status": "error", "message": "Falha ao consultar o provedor de CEP" })),
        )
            .into_response());
    }

    let body: serde_json::Value = resp.json().await?;
    if body.get("erro").is_some() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "message": "CEP não encontrado" })),
        )
            .into_response());
    }

    let uf = body.get("uf").and_then(|v| v.as_str()).unwrap_or_default();
    let estado = uf_to_estado(uf).unwrap_or_default();
    debug!(%cep, %uf, "CEP resolved");

    Ok(Json(json!({
        "cep": body.get("cep").and_then(|v| v.as_str()).unwrap_or(&cep),
        "logradouro": body.get("logradouro").and_then(|v| v.as_str()).unwrap_or_default(),
        "complemento": body.get("complemento").and_then(|v| v.as_str()).unwrap_or_default(),
        "bairro": body.get("bairro").and_then(|v| v.as_str()).unwrap_or_default(),
        "localidade": body.get("localidade").and_then(|v| v.as_str()).unwrap_or_default(),
        "uf": uf,
        "estado": estado,
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_ufs() {
        assert_eq!(uf_to_estado("MG"), Some("Minas Gerais"));
        assert_eq!(uf_to_estado("SP"), Some("São Paulo"));
        assert_eq!(uf_to_estado("XX"), None);
    }
}
