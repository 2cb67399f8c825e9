use lazy_static::lazy_static;
use regex::Regex;

use crate::client::{ApiClient, ClientError};
use crate::models::CepData;

lazy_static! {
    static ref NON_DIGITS: Regex = Regex::new(r"\D").unwrap();
}

fn digits(cep: &str) -> String {
    NON_DIGITS.replace_all(cep, "").into_owned()
}

#[derive(Clone)]
pub struct CepService {
    client: ApiClient,
}

impl CepService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Looks up a Brazilian postal code through the gateway. The input is
    /// stripped of punctuation first; anything other than 8 digits is
    /// rejected before the network call.
    pub async fn search(&self, cep: &str) -> Result<CepData, ClientError> {
        let clean = digits(cep);
        if clean.len() != 8 {
            return Err(ClientError::Domain("CEP deve ter 8 dígitos".to_string()));
        }
        let resp = self.client.get_json(&format!("/cep?cep={clean}")).await?;
        Ok(serde_json::from_value(resp)?)
    }
}

/// `12345678` -> `12345-678`. Inputs that do not hold exactly 8 digits
/// come back unchanged.
pub fn format_cep(cep: &str) -> String {
    let clean = digits(cep);
    if clean.len() == 8 {
        format!("{}-{}", &clean[..5], &clean[5..])
    } else {
        cep.to_string()
    }
}

pub fn validate_format(cep: &str) -> bool {
    digits(cep).len() == 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_eight_digit_cep() {
        assert_eq!(format_cep("12345678"), "12345-678");
        assert_eq!(format_cep("12.345-678"), "12345-678");
    }

    #[test]
    fn leaves_invalid_input_alone() {
        assert_eq!(format_cep("1234"), "1234");
        assert_eq!(format_cep(""), "");
    }

    #[test]
    fn validates_digit_count() {
        assert!(validate_format("12345-678"));
        assert!(!validate_format("12345-67"));
        assert!(!validate_format("abcdefgh"));
    }
}
