//! Structural validators for pattern matches
//!
//! A failed check never discards a match: it lowers the confidence and marks
//! the entity invalid so a reviewer still sees it.

use crate::anonymization::models::EntityType;

/// Confidence given to a validated type that passes its structural check
pub const VALID_CONFIDENCE: f32 = 0.98;

/// Confidence given to a validated type that fails its structural check
pub const INVALID_CONFIDENCE: f32 = 0.6;

/// Outcome of a structural check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub subtype: Option<&'static str>,
}

impl Validation {
    fn valid(subtype: Option<&'static str>) -> Self {
        Self {
            valid: true,
            subtype,
        }
    }

    fn invalid(subtype: Option<&'static str>) -> Self {
        Self {
            valid: false,
            subtype,
        }
    }

    /// Confidence for a match of `entity_type` with this outcome
    pub fn confidence(&self, entity_type: EntityType, pattern_confidence: f32) -> f32 {
        if !entity_type.is_validated() {
            return pattern_confidence;
        }
        if self.valid {
            VALID_CONFIDENCE
        } else {
            INVALID_CONFIDENCE
        }
    }
}

/// Run the structural check for `entity_type` on `text`
pub fn validate(entity_type: EntityType, text: &str) -> Validation {
    match entity_type {
        EntityType::RegistrationNumber => validate_registration_number(text),
        EntityType::Phone => Validation {
            valid: has_phone_digits(text),
            subtype: None,
        },
        EntityType::SocialSecurity => Validation {
            valid: is_valid_nir(text),
            subtype: None,
        },
        EntityType::Email => Validation {
            valid: is_plausible_email(text),
            subtype: None,
        },
        _ => Validation::valid(None),
    }
}

fn digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Luhn checksum over a string of ASCII digits
pub fn luhn(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let total: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(index, byte)| {
            let digit = u32::from(byte - b'0');
            if index % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    total % 10 == 0
}

fn validate_registration_number(text: &str) -> Validation {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
        .collect::<String>()
        .to_uppercase();

    if is_ape_code(&compact) {
        return Validation::valid(Some("APE"));
    }

    let number = digits(&compact);
    match number.len() {
        14 => checked(luhn(&number), "SIRET"),
        9 => checked(luhn(&number), "SIREN"),
        11 => checked(is_valid_vat_key(&number), "TVA"),
        _ => Validation::invalid(None),
    }
}

fn checked(valid: bool, subtype: &'static str) -> Validation {
    if valid {
        Validation::valid(Some(subtype))
    } else {
        Validation::invalid(Some(subtype))
    }
}

/// Four digits followed by one letter, e.g. `6920Z`
fn is_ape_code(compact: &str) -> bool {
    let bytes = compact.as_bytes();
    bytes.len() == 5
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4].is_ascii_uppercase()
}

/// French intra-community VAT: two key digits then the SIREN
fn is_valid_vat_key(number: &str) -> bool {
    let (key, siren) = number.split_at(2);
    match (key.parse::<u64>(), siren.parse::<u64>()) {
        (Ok(key), Ok(siren)) => key == (12 + 3 * (siren % 97)) % 97,
        _ => false,
    }
}

/// French NIR: 13 digits plus a two-digit key `97 - (n mod 97)`
fn is_valid_nir(text: &str) -> bool {
    let number = digits(text);
    if number.len() != 15 || !(number.starts_with('1') || number.starts_with('2')) {
        return false;
    }
    let (body, key) = number.split_at(13);
    match (body.parse::<u64>(), key.parse::<u64>()) {
        (Ok(body), Ok(key)) => 97 - (body % 97) == key,
        _ => false,
    }
}

/// Ten national digits, or nine after an international +33 prefix
fn has_phone_digits(text: &str) -> bool {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix("+33") {
        return digits(rest).len() >= 9;
    }
    digits(text).len() >= 10
}

fn is_plausible_email(text: &str) -> bool {
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.contains('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("732 829 320 00074", true, Some("SIRET") ; "valid siret with spaces")]
    #[test_case("73282932000047", false, Some("SIRET") ; "siret with transposed digits")]
    #[test_case("732829320", true, Some("SIREN") ; "valid siren")]
    #[test_case("732.829.302", false, Some("SIREN") ; "invalid siren")]
    #[test_case("FR 44 732829320", true, Some("TVA") ; "valid vat number")]
    #[test_case("FR45732829320", false, Some("TVA") ; "vat with wrong key")]
    #[test_case("6920Z", true, Some("APE") ; "ape code")]
    #[test_case("12345", false, None ; "unknown length")]
    fn test_registration_numbers(text: &str, valid: bool, subtype: Option<&str>) {
        let result = validate(EntityType::RegistrationNumber, text);
        assert_eq!(result.valid, valid);
        assert_eq!(result.subtype, subtype);
    }

    #[test_case("01 23 45 67 89", true ; "national format")]
    #[test_case("+33 1 23 45 67 89", true ; "international format")]
    #[test_case("01 23 45", false ; "too few digits")]
    fn test_phone_numbers(text: &str, valid: bool) {
        assert_eq!(validate(EntityType::Phone, text).valid, valid);
    }

    #[test_case("1 85 05 78 006 084 91", true ; "valid key")]
    #[test_case("1 85 05 78 006 084 19", false ; "wrong key")]
    #[test_case("3 85 05 78 006 084 91", false ; "invalid sex digit")]
    fn test_social_security_numbers(text: &str, valid: bool) {
        assert_eq!(validate(EntityType::SocialSecurity, text).valid, valid);
    }

    #[test]
    fn test_confidence_levels() {
        let valid = validate(EntityType::RegistrationNumber, "73282932000074");
        let invalid = validate(EntityType::RegistrationNumber, "73282932000047");
        assert_eq!(valid.confidence(EntityType::RegistrationNumber, 0.9), 0.98);
        assert_eq!(invalid.confidence(EntityType::RegistrationNumber, 0.9), 0.6);
    }

    #[test]
    fn test_unvalidated_types_keep_pattern_confidence() {
        let result = validate(EntityType::Person, "Jean Dupont");
        assert!(result.valid);
        assert_eq!(result.confidence(EntityType::Person, 0.85), 0.85);
    }

    #[test]
    fn test_luhn_rejects_non_digits() {
        assert!(!luhn(""));
        assert!(!luhn("12a4"));
        assert!(luhn("79927398713"));
    }
}
