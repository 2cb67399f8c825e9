use serde::{Deserialize, Serialize};

use super::HasId;

fn de_flex_num<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
        Null,
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Num(n) => Some(n),
        Raw::Text(s) => s.trim().parse().ok(),
        Raw::Null => None,
    })
}

fn de_flex_opt_i64<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(de_flex_num(de)?.map(|n| n as i64))
}

/// Price as the upstream sent it. Legacy rows serialize `imo_valor` as a
/// digit string, newer ones as a number; the form's hydration rules differ
/// between the two, so the distinction must survive deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Number(f64),
    Text(String),
}

impl Price {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Price::Number(n) => Some(*n),
            Price::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Room counts and free-text description, nested under `descricao` upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyDetails {
    #[serde(rename = "imd_quartos", alias = "bedrooms", default, deserialize_with = "de_flex_opt_i64")]
    pub quartos: Option<i64>,
    #[serde(rename = "imd_banheiros", alias = "bathrooms", default, deserialize_with = "de_flex_opt_i64")]
    pub banheiros: Option<i64>,
    #[serde(rename = "imd_suites", alias = "suites", default, deserialize_with = "de_flex_opt_i64")]
    pub suites: Option<i64>,
    #[serde(rename = "imd_lavanderias", alias = "laundries", default, deserialize_with = "de_flex_opt_i64")]
    pub lavanderias: Option<i64>,
    #[serde(rename = "imd_escritorios", alias = "escritorios", default, deserialize_with = "de_flex_opt_i64")]
    pub escritorios: Option<i64>,
    #[serde(rename = "imd_vagas", alias = "parking", default, deserialize_with = "de_flex_opt_i64")]
    pub vagas: Option<i64>,
    #[serde(rename = "imd_area_util", alias = "usableArea", default, deserialize_with = "de_flex_num")]
    pub area_util: Option<f64>,
    #[serde(rename = "imd_area_total", alias = "totalArea", default, deserialize_with = "de_flex_num")]
    pub area_total: Option<f64>,
    #[serde(rename = "imd_descricao", alias = "description", default)]
    pub descricao: Option<String>,
    #[serde(rename = "imd_status", alias = "status", default)]
    pub status: Option<String>,
    #[serde(rename = "imd_closets", alias = "closets", default, deserialize_with = "de_flex_opt_i64")]
    pub closets: Option<i64>,
    #[serde(rename = "imd_cozinhas", alias = "kitchens", default, deserialize_with = "de_flex_opt_i64")]
    pub cozinhas: Option<i64>,
    #[serde(rename = "imd_lavabos", alias = "lavabos", default, deserialize_with = "de_flex_opt_i64")]
    pub lavabos: Option<i64>,
    #[serde(rename = "imd_sala_estar", alias = "estar", default, deserialize_with = "de_flex_opt_i64")]
    pub sala_estar: Option<i64>,
    #[serde(rename = "imd_sala_jantar", alias = "jantar", default, deserialize_with = "de_flex_opt_i64")]
    pub sala_jantar: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyPhoto {
    #[serde(rename = "imo_foto")]
    pub path: String,
}

/// Property listing as the upstream returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    #[serde(rename = "imo_nome", alias = "name", alias = "title")]
    pub nome: String,
    #[serde(rename = "imo_slug", alias = "slug", default)]
    pub slug: Option<String>,
    #[serde(rename = "imo_categoria", alias = "category", alias = "type")]
    pub categoria: String,
    #[serde(rename = "imo_valor", alias = "price", default)]
    pub valor: Option<Price>,
    #[serde(rename = "imo_endereco", alias = "address", default)]
    pub endereco: Option<String>,
    #[serde(rename = "imo_cep", alias = "zipCode", default)]
    pub cep: Option<String>,
    #[serde(rename = "imo_latitude", alias = "latitude", default, deserialize_with = "de_flex_num")]
    pub latitude: Option<f64>,
    #[serde(rename = "imo_longitude", alias = "longitude", default, deserialize_with = "de_flex_num")]
    pub longitude: Option<f64>,
    #[serde(rename = "imo_condominio", alias = "condominium", default)]
    pub condominio: Option<String>,
    #[serde(rename = "bai_id", alias = "neighborhoodId", default, deserialize_with = "de_flex_opt_i64")]
    pub bairro_id: Option<i64>,
    #[serde(default)]
    pub estado_nome: Option<String>,
    #[serde(default)]
    pub cidade_nome: Option<String>,
    #[serde(default)]
    pub bairro_nome: Option<String>,
    #[serde(rename = "prp_nome", alias = "ownerName", default)]
    pub proprietario_nome: Option<String>,
    #[serde(rename = "prp_id", alias = "ownerId", default, deserialize_with = "de_flex_opt_i64")]
    pub proprietario_id: Option<i64>,
    #[serde(rename = "descricao", alias = "details", default)]
    pub detalhes: Option<PropertyDetails>,
    #[serde(rename = "caracteristicas", alias = "features", default)]
    pub caracteristicas: Vec<String>,
    #[serde(rename = "imo_fotos", default)]
    pub fotos: Vec<PropertyPhoto>,
}

impl Property {
    /// Resolves photo paths into absolute URLs on the public image host.
    pub fn image_urls(&self, image_host: &str) -> Vec<String> {
        let host = image_host.trim_end_matches('/');
        self.fotos
            .iter()
            .filter_map(|f| {
                let p = f.path.trim();
                if p.is_empty() {
                    return None;
                }
                if p.starts_with("http://") || p.starts_with("https://") {
                    return Some(p.to_string());
                }
                let p = p.trim_start_matches('/');
                if p.starts_with("public/") {
                    Some(format!("{host}/{p}"))
                } else {
                    Some(format!("{host}/public/{p}"))
                }
            })
            .collect()
    }
}

impl HasId for Property {
    fn id(&self) -> i64 {
        self.id
    }
}
