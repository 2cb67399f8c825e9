//! Price field normalization.
//!
//! The form keeps prices as a digit string of integer cents. Free text
//! like "350.000,00" or "R$ 1.250,50" is normalized on input; the wire
//! format sent upstream is a plain decimal ("350000" or "1250.5").

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_DIGITS: Regex = Regex::new(r"\D").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[.,]").unwrap();
    static ref NON_PRICE: Regex = Regex::new(r"[^0-9.,]").unwrap();
}

pub(crate) fn only_digits(s: &str) -> String {
    NON_DIGITS.replace_all(s, "").into_owned()
}

/// Free-text price to cents digits. Without a separator the value is
/// whole currency units; with one, the last group is the decimal part,
/// padded or truncated to two places.
pub fn normalize_price_digits(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    if !SEPARATORS.is_match(s) {
        let d = only_digits(s);
        if d.is_empty() {
            return String::new();
        }
        return match d.parse::<u128>() {
            Ok(n) => (n * 100).to_string(),
            Err(_) => String::new(),
        };
    }
    let cleaned = NON_PRICE.replace_all(s, "");
    let mut parts: Vec<String> = SEPARATORS
        .split(&cleaned)
        .map(|p| only_digits(p))
        .collect();
    let dec_raw = parts.pop().unwrap_or_default();
    let int_raw: String = parts.concat();
    let mut dec = dec_raw;
    while dec.len() < 2 {
        dec.push('0');
    }
    dec.truncate(2);
    let int_digits = if int_raw.is_empty() {
        "0".to_string()
    } else {
        int_raw
    };
    format!("{int_digits}{dec}")
}

/// Stored value to cents digits, used when hydrating from an existing
/// record. Digit strings longer than 5 are assumed to already be cents.
pub fn hydrate_price_digits(value: &str) -> String {
    let s = value.trim();
    if s.is_empty() {
        return String::new();
    }
    let d = only_digits(s);
    if d.is_empty() {
        return String::new();
    }
    if d.len() > 5 {
        return d;
    }
    match d.parse::<u128>() {
        Ok(n) => (n * 100).to_string(),
        Err(_) => String::new(),
    }
}

/// Cents digits to the decimal string sent upstream. Trailing zeros in
/// the fraction are dropped ("35000000" -> "350000", "123450" -> "1234.5").
pub fn to_decimal(digits: &str) -> String {
    if digits.is_empty() {
        return String::new();
    }
    let Ok(n) = digits.parse::<u128>() else {
        return String::new();
    };
    let units = n / 100;
    let cents = n % 100;
    if cents == 0 {
        units.to_string()
    } else if cents % 10 == 0 {
        format!("{units}.{}", cents / 10)
    } else {
        format!("{units}.{cents:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brazilian_thousands_and_decimal() {
        assert_eq!(normalize_price_digits("350.000,00"), "35000000");
        assert_eq!(to_decimal("35000000"), "350000");
    }

    #[test]
    fn bare_digits_are_whole_units() {
        assert_eq!(normalize_price_digits("350000"), "35000000");
        assert_eq!(normalize_price_digits("R$ 1500"), "150000");
    }

    #[test]
    fn short_decimal_is_padded() {
        assert_eq!(normalize_price_digits("1,5"), "150");
        assert_eq!(normalize_price_digits("1.250,5"), "125050");
        assert_eq!(to_decimal("125050"), "1250.5");
    }

    #[test]
    fn missing_integer_part_defaults_to_zero() {
        assert_eq!(normalize_price_digits(",99"), "099");
        assert_eq!(to_decimal("099"), "0.99");
    }

    #[test]
    fn empty_and_garbage_inputs() {
        assert_eq!(normalize_price_digits(""), "");
        assert_eq!(normalize_price_digits("abc"), "");
        assert_eq!(to_decimal(""), "");
    }

    #[test]
    fn hydration_detects_cents_by_length() {
        // already cents
        assert_eq!(hydrate_price_digits("35000000"), "35000000");
        // short digit strings are whole units
        assert_eq!(hydrate_price_digits("350"), "35000");
        assert_eq!(hydrate_price_digits("350.000,00"), "35000000");
    }

    #[test]
    fn decimal_keeps_nonzero_cents() {
        assert_eq!(to_decimal("123456"), "1234.56");
        assert_eq!(to_decimal("100"), "1");
    }
}
