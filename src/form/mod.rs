//! Property form controller.
//!
//! Holds the draft values, staged photo uploads and field errors for
//! the admin property form, and reconciles the draft against the
//! reference lists (owners, states, cities, neighborhoods) and postal
//! code lookups. All name matching goes through one normalization
//! (accent strip + lowercase).

pub mod price;

use std::collections::BTreeMap;

use tracing::debug;

use crate::client::{ClientError, MultipartPayload, StagedFile};
use crate::crud::Notifier;
use crate::models::{Bairro, CepData, Cidade, Estado, Owner, Price, Property};
use crate::services::PropertiesService;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const PROPERTY_TYPES: [&str; 4] = ["Casa", "Apartamento", "Terreno", "Comercial"];

/// Accent-stripped lowercase form used for every name comparison.
pub fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

fn names_match(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && normalize(a) == normalize(b)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFormData {
    pub title: String,
    pub tipo: String,
    /// Integer cents as a digit string, see [`price`].
    pub price: String,
    pub address: String,
    pub zip_code: String,
    pub condominio: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub estado_nome: String,
    pub cidade_nome: String,
    pub bairro_nome: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub suites: String,
    pub laundries: String,
    pub escritorios: String,
    pub parking: String,
    pub area: String,
    pub total_area: String,
    pub description: String,
    pub status: String,
    pub features: Vec<String>,
    pub owner_id: Option<i64>,
    pub closets: String,
    pub kitchens: String,
    pub lavabos: String,
    pub estar: String,
    pub jantar: String,
}

impl Default for PropertyFormData {
    fn default() -> Self {
        Self {
            title: String::new(),
            tipo: "Casa".to_string(),
            price: String::new(),
            address: String::new(),
            zip_code: String::new(),
            condominio: String::new(),
            latitude: None,
            longitude: None,
            estado_nome: String::new(),
            cidade_nome: String::new(),
            bairro_nome: String::new(),
            bedrooms: String::new(),
            bathrooms: String::new(),
            suites: String::new(),
            laundries: String::new(),
            escritorios: String::new(),
            parking: String::new(),
            area: String::new(),
            total_area: String::new(),
            description: String::new(),
            status: "À venda".to_string(),
            features: Vec::new(),
            owner_id: None,
            closets: String::new(),
            kitchens: String::new(),
            lavabos: String::new(),
            estar: String::new(),
            jantar: String::new(),
        }
    }
}

fn count_str(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn area_str(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

impl PropertyFormData {
    pub fn from_property(p: &Property) -> Self {
        let d = p.detalhes.clone().unwrap_or_default();
        Self {
            title: p.nome.clone(),
            tipo: if p.categoria.is_empty() {
                "Casa".to_string()
            } else {
                p.categoria.clone()
            },
            // String prices follow the stored-value length rule; numeric
            // ones are whole currency units.
            price: match &p.valor {
                Some(Price::Text(s)) => price::hydrate_price_digits(s),
                Some(Price::Number(n)) => ((n * 100.0).round() as u128).to_string(),
                None => String::new(),
            },
            address: p.endereco.clone().unwrap_or_default(),
            zip_code: price::only_digits(p.cep.as_deref().unwrap_or_default()),
            condominio: p.condominio.clone().unwrap_or_default(),
            latitude: p.latitude,
            longitude: p.longitude,
            estado_nome: p.estado_nome.clone().unwrap_or_default(),
            cidade_nome: p.cidade_nome.clone().unwrap_or_default(),
            bairro_nome: p.bairro_nome.clone().unwrap_or_default(),
            bedrooms: count_str(d.quartos),
            bathrooms: count_str(d.banheiros),
            suites: count_str(d.suites),
            laundries: count_str(d.lavanderias),
            escritorios: count_str(d.escritorios),
            parking: count_str(d.vagas),
            area: area_str(d.area_util),
            total_area: area_str(d.area_total),
            description: d.descricao.unwrap_or_default(),
            status: d.status.unwrap_or_else(|| "À venda".to_string()),
            features: p.caracteristicas.clone(),
            owner_id: p.proprietario_id,
            closets: count_str(d.closets),
            kitchens: count_str(d.cozinhas),
            lavabos: count_str(d.lavabos),
            estar: count_str(d.sala_estar),
            jantar: count_str(d.sala_jantar),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormMode {
    Create,
    Edit(i64),
}

pub struct PropertyForm {
    pub mode: FormMode,
    pub values: PropertyFormData,
    pub errors: BTreeMap<&'static str, String>,
    pub dirty: bool,
    pub owner_query: String,
    files: Vec<StagedFile>,
    previews: Vec<String>,
    revoked: Vec<String>,
    preview_seq: u64,
    hydrated: bool,
    owner_hydrated: bool,
    last_applied_cep: Option<String>,
}

impl PropertyForm {
    pub fn new(mode: FormMode) -> Self {
        Self {
            mode,
            values: PropertyFormData::default(),
            errors: BTreeMap::new(),
            dirty: false,
            owner_query: String::new(),
            files: Vec::new(),
            previews: Vec::new(),
            revoked: Vec::new(),
            preview_seq: 0,
            hydrated: false,
            owner_hydrated: false,
            last_applied_cep: None,
        }
    }

    pub fn patch(&mut self, f: impl FnOnce(&mut PropertyFormData)) {
        f(&mut self.values);
        self.dirty = true;
    }

    pub fn reset(&mut self) {
        self.values = PropertyFormData::default();
        self.errors.clear();
        self.clear_files();
        self.dirty = false;
        self.owner_query.clear();
    }

    /// Fills the draft from a loaded record, once per form instance.
    /// Later refetches of the same record must not clobber user edits.
    pub fn hydrate(&mut self, property: &Property) {
        if !matches!(self.mode, FormMode::Edit(_)) || self.hydrated {
            return;
        }
        self.values = PropertyFormData::from_property(property);
        self.dirty = false;
        self.hydrated = true;
        debug!(property = property.id, "Formulário hidratado");
    }

    /// Shows the record's saved photos until local files are staged.
    pub fn seed_previews(&mut self, urls: Vec<String>) {
        if self.files.is_empty() && !urls.is_empty() {
            self.previews = urls;
        }
    }

    /// Matches the record's owner name against the loaded owner list to
    /// recover the owner id, once. Skipped (and retried on a later call)
    /// while the owner list is still empty.
    pub fn reconcile_owner(&mut self, property: &Property, owners: &[Owner]) {
        let name_from_api = property
            .proprietario_nome
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string();
        if self.owner_query.is_empty() {
            self.owner_query = name_from_api.clone();
        }
        if self.owner_hydrated || owners.is_empty() {
            return;
        }
        if name_from_api.is_empty() {
            self.owner_hydrated = true;
            return;
        }
        if let Some(owner) = owners.iter().find(|o| names_match(&o.nome, &name_from_api)) {
            self.values.owner_id = Some(owner.id);
        }
        self.owner_hydrated = true;
    }

    /// Recovers the location names from the record's neighborhood id
    /// when the upstream omitted all three of them.
    pub fn backfill_location(&mut self, property: &Property, bairros: &[Bairro]) {
        if !self.values.estado_nome.is_empty()
            && !self.values.cidade_nome.is_empty()
            && !self.values.bairro_nome.is_empty()
        {
            return;
        }
        let Some(bairro_id) = property.bairro_id else {
            return;
        };
        let Some(b) = bairros.iter().find(|b| b.id == bairro_id) else {
            return;
        };
        if self.values.bairro_nome.is_empty() {
            self.values.bairro_nome = b.nome.clone();
        }
        if self.values.cidade_nome.is_empty() {
            self.values.cidade_nome = b.cidade_nome.clone().unwrap_or_default();
        }
        if self.values.estado_nome.is_empty() {
            self.values.estado_nome = b.estado_nome.clone().unwrap_or_default();
        }
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn previews(&self) -> &[String] {
        &self.previews
    }

    /// Preview URLs released since the last regeneration, in release order.
    pub fn revoked_previews(&self) -> &[String] {
        &self.revoked
    }

    fn is_image(file: &StagedFile) -> bool {
        if !file.content_type.is_empty() {
            return file.content_type.starts_with("image/");
        }
        mime_guess::from_path(&file.name)
            .first()
            .map(|m| m.type_() == mime_guess::mime::IMAGE)
            .unwrap_or(false)
    }

    /// Stages uploads, dropping anything that is not an image or is over
    /// the size limit. After this call `previews` mirrors `files` 1:1.
    pub fn add_files(&mut self, incoming: Vec<StagedFile>) {
        let valid: Vec<StagedFile> = incoming
            .into_iter()
            .filter(|f| Self::is_image(f) && f.size() <= MAX_UPLOAD_BYTES)
            .collect();
        if valid.is_empty() {
            return;
        }
        self.files.extend(valid);
        self.dirty = true;
        self.regenerate_previews();
    }

    pub fn remove_file(&mut self, index: usize) {
        if index >= self.files.len() {
            return;
        }
        self.files.remove(index);
        self.dirty = true;
        self.regenerate_previews();
    }

    pub fn clear_files(&mut self) {
        self.files.clear();
        self.regenerate_previews();
    }

    fn regenerate_previews(&mut self) {
        self.revoked.append(&mut self.previews);
        let mut seq = self.preview_seq;
        self.previews = self
            .files
            .iter()
            .map(|f| {
                seq += 1;
                format!("blob:{}-{}", seq, f.name)
            })
            .collect();
        self.preview_seq = seq;
    }

    /// Remote owner search only pays off past a local list the filter
    /// cannot handle and a query worth sending.
    pub fn needs_remote_owner_search(&self, base_len: usize) -> bool {
        self.owner_query.trim().len() >= 2 && base_len > 200
    }

    /// Owner picker entries: remote results win when present; otherwise
    /// the base list filtered by normalized name or by the digits of
    /// document/phone/id. An empty filter result falls back to the base
    /// list so accent variations never leave the picker blank.
    pub fn filter_owners(&self, base: &[Owner], remote: &[Owner]) -> Vec<Owner> {
        if !remote.is_empty() {
            return remote.to_vec();
        }
        let q = self.owner_query.trim();
        if q.is_empty() {
            return base.to_vec();
        }
        let q_norm = normalize(q);
        let q_dig = price::only_digits(q);
        let filtered: Vec<Owner> = base
            .iter()
            .filter(|o| {
                let by_name = !q_norm.is_empty() && normalize(&o.nome).contains(&q_norm);
                let by_digits = !q_dig.is_empty()
                    && (price::only_digits(o.documento.as_deref().unwrap_or_default())
                        .contains(&q_dig)
                        || price::only_digits(&o.telefone).contains(&q_dig)
                        || o.id.to_string().contains(&q_dig));
                by_name || by_digits
            })
            .cloned()
            .collect();
        if filtered.is_empty() {
            base.to_vec()
        } else {
            filtered
        }
    }

    pub fn cidades_filtradas(&self, all: &[Cidade]) -> Vec<Cidade> {
        if self.values.estado_nome.trim().is_empty() {
            return all.to_vec();
        }
        all.iter()
            .filter(|c| {
                names_match(
                    c.estado_nome.as_deref().unwrap_or_default(),
                    &self.values.estado_nome,
                )
            })
            .cloned()
            .collect()
    }

    pub fn bairros_filtrados(&self, all: &[Bairro]) -> Vec<Bairro> {
        if self.values.cidade_nome.trim().is_empty() {
            return all.to_vec();
        }
        all.iter()
            .filter(|b| {
                names_match(
                    b.cidade_nome.as_deref().unwrap_or_default(),
                    &self.values.cidade_nome,
                )
            })
            .cloned()
            .collect()
    }

    /// Applies a postal-code lookup result. Address and coordinates are
    /// patched immediately; location names are filled only when state,
    /// city and neighborhood all resolve against the reference lists,
    /// otherwise an informational notice lists what is missing. Each
    /// distinct CEP result is applied at most once.
    pub fn apply_cep(
        &mut self,
        data: &CepData,
        estados: &[Estado],
        cidades: &[Cidade],
        bairros: &[Bairro],
        notifier: &dyn Notifier,
    ) {
        if self.last_applied_cep.as_deref() == Some(data.cep.as_str()) {
            return;
        }

        if !data.cep.is_empty() {
            self.values.zip_code = price::only_digits(&data.cep);
        }
        if !data.logradouro.is_empty() {
            self.values.address = data.logradouro.clone();
        }
        if let Some(lat) = data.latitude {
            self.values.latitude = Some(lat);
        }
        if let Some(lng) = data.longitude {
            self.values.longitude = Some(lng);
        }
        self.dirty = true;

        let state_full = data.estado.as_deref().unwrap_or_default().trim();
        if state_full.is_empty() {
            notifier.info(
                "Estado não localizado na API de CEP, por favor insira o estado manualmente!",
            );
            self.last_applied_cep = Some(data.cep.clone());
            return;
        }

        let est = estados.iter().find(|e| names_match(&e.nome, state_full));
        let cid = est.and_then(|_| {
            cidades.iter().find(|c| {
                names_match(&c.nome, &data.localidade)
                    && c.estado_nome
                        .as_deref()
                        .map(|s| s.is_empty() || names_match(s, state_full))
                        .unwrap_or(true)
            })
        });
        let bai = cid.and_then(|_| {
            bairros.iter().find(|b| {
                names_match(&b.nome, &data.bairro)
                    && b.cidade_nome
                        .as_deref()
                        .map(|s| s.is_empty() || names_match(s, &data.localidade))
                        .unwrap_or(true)
            })
        });

        match (est, cid, bai) {
            (Some(e), Some(c), Some(b)) => {
                self.values.estado_nome = e.nome.clone();
                self.values.cidade_nome = c.nome.clone();
                self.values.bairro_nome = b.nome.clone();
            }
            _ => {
                let mut missing = Vec::new();
                if est.is_none() {
                    missing.push(format!("estado \"{state_full}\""));
                }
                if est.is_some() && cid.is_none() {
                    missing.push(format!("cidade \"{}\"", data.localidade));
                }
                if cid.is_some() && bai.is_none() {
                    missing.push(format!("bairro \"{}\"", data.bairro));
                }
                if !missing.is_empty() {
                    notifier.info(&format!(
                        "Dados do CEP não estão cadastrados no sistema. Cadastre {} para preenchimento automático.",
                        missing.join(", ")
                    ));
                }
            }
        }

        self.last_applied_cep = Some(data.cep.clone());
    }

    /// Field-level checks, resolved entirely before any network call.
    /// Keeps the first message per field.
    pub fn validate(&mut self) -> bool {
        let mut errors = BTreeMap::new();
        if self.values.title.trim().is_empty() {
            errors.insert("title", "Título é obrigatório".to_string());
        }
        if !PROPERTY_TYPES.contains(&self.values.tipo.as_str()) {
            errors.insert("tipo", "Tipo de imóvel inválido".to_string());
        }
        self.errors = errors;
        self.errors.is_empty()
    }

    /// Assembles the multipart body the upstream expects. Legacy and
    /// current field names are both sent; empty values are skipped.
    pub fn build_multipart(&self) -> MultipartPayload {
        let v = &self.values;
        let price_digits = price::only_digits(&v.price);
        let price_decimal = price::to_decimal(&price_digits);
        let cep_digits = price::only_digits(&v.zip_code);

        let mut payload = MultipartPayload::default();
        let mut field = |key: &str, value: String| {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                payload.text(key.to_string(), trimmed);
            }
        };

        field("imo_nome", v.title.clone());
        field("imo_categoria", v.tipo.clone());
        field("imo_valor", price_decimal);
        field("imo_endereco", v.address.clone());
        field("imo_cep", cep_digits.clone());
        field("imo_latitude", v.latitude.map(|n| n.to_string()).unwrap_or_default());
        field("imo_longitude", v.longitude.map(|n| n.to_string()).unwrap_or_default());
        field("imo_condominio", v.condominio.clone());
        field("estado_nome", v.estado_nome.clone());
        field("cidade_nome", v.cidade_nome.clone());
        field("bairro_nome", v.bairro_nome.clone());
        field("imd_status", v.status.clone());
        field("description", v.description.clone());
        field("bedrooms", v.bedrooms.clone());
        field("bathrooms", v.bathrooms.clone());
        field("suites", v.suites.clone());
        field("laundries", v.laundries.clone());
        field("escritorios", v.escritorios.clone());
        field("closets", v.closets.clone());
        field("kitchens", v.kitchens.clone());
        field("lavabos", v.lavabos.clone());
        field("estar", v.estar.clone());
        field("jantar", v.jantar.clone());
        field("parking", v.parking.clone());
        field("area", v.area.clone());
        field("totalArea", v.total_area.clone());
        field("prp_id", v.owner_id.map(|n| n.to_string()).unwrap_or_default());

        // duplicated under the newer names for upstream versions that
        // dropped the imo_ prefixes
        field("type", v.tipo.clone());
        field("price", price_digits);
        field("title", v.title.clone());
        field("zipCode", cep_digits);
        field("latitude", v.latitude.map(|n| n.to_string()).unwrap_or_default());
        field("longitude", v.longitude.map(|n| n.to_string()).unwrap_or_default());

        for (i, tag) in v.features.iter().enumerate() {
            let tag = tag.trim();
            if !tag.is_empty() {
                payload.text(format!("features[{i}]"), tag.to_string());
            }
        }
        for (i, file) in self.files.iter().enumerate() {
            payload.file(format!("images[{i}]"), file.clone());
        }
        payload
    }

    pub async fn submit_create(
        &mut self,
        service: &PropertiesService,
    ) -> Result<(), ClientError> {
        if !self.validate() {
            return Err(ClientError::Domain("Formulário inválido".to_string()));
        }
        service.create(&self.build_multipart()).await?;
        self.dirty = false;
        Ok(())
    }

    pub async fn submit_update(
        &mut self,
        service: &PropertiesService,
        id: i64,
    ) -> Result<(), ClientError> {
        if !self.validate() {
            return Err(ClientError::Domain("Formulário inválido".to_string()));
        }
        service.update(id, &self.build_multipart()).await?;
        self.dirty = false;
        Ok(())
    }
}
