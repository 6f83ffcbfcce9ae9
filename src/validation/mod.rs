use std::fmt;

pub const PIX_KEY_MAX_LEN: usize = 77;
pub const EMAIL_MAX_LEN: usize = 77;
pub const CPF_LEN: usize = 11;
pub const CNPJ_LEN: usize = 14;
pub const BR_COUNTRY_CODE: &str = "+55";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch.is_whitespace() { ' ' } else { ch })
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Amounts are integer minor units and must be strictly positive.
pub fn validate_positive_amount(amount_minor: i64) -> ValidationResult {
    if amount_minor <= 0 {
        return Err(ValidationError::new(
            "amount",
            "must be a positive integer number of cents",
        ));
    }

    Ok(())
}

/// Key types the provider accepts for PIX payouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixKeyKind {
    Cpf,
    Cnpj,
    Email,
    Phone,
    Evp,
}

impl PixKeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixKeyKind::Cpf => "cpf",
            PixKeyKind::Cnpj => "cnpj",
            PixKeyKind::Email => "email",
            PixKeyKind::Phone => "phone",
            PixKeyKind::Evp => "evp",
        }
    }
}

/// A payout key that passed format validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixKey {
    kind: PixKeyKind,
    value: String,
}

impl PixKey {
    pub fn kind(&self) -> PixKeyKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
}

/// Classifies and validates a PIX key.
///
/// CPF and CNPJ keys may be punctuated (`123.456.789-09`); phone keys must
/// carry the `+55` country code so they cannot be confused with a CPF.
pub fn parse_pix_key(raw: &str) -> Result<PixKey, ValidationError> {
    let value = sanitize_string(raw);
    validate_required("pix_key", &value)?;
    validate_max_len("pix_key", &value, PIX_KEY_MAX_LEN)?;

    if let Some(rest) = value.strip_prefix(BR_COUNTRY_CODE) {
        if all_digits(rest) && (10..=11).contains(&rest.len()) {
            return Ok(PixKey {
                kind: PixKeyKind::Phone,
                value,
            });
        }
        return Err(ValidationError::new(
            "pix_key",
            "phone keys must be +55 followed by 10 or 11 digits",
        ));
    }

    if value.contains('@') {
        validate_max_len("pix_key", &value, EMAIL_MAX_LEN)?;
        if looks_like_email(&value) {
            return Ok(PixKey {
                kind: PixKeyKind::Email,
                value: value.to_ascii_lowercase(),
            });
        }
        return Err(ValidationError::new("pix_key", "invalid e-mail key"));
    }

    if uuid::Uuid::parse_str(&value).is_ok() {
        return Ok(PixKey {
            kind: PixKeyKind::Evp,
            value: value.to_ascii_lowercase(),
        });
    }

    let digits: String = value.chars().filter(|ch| !matches!(ch, '.' | '-' | '/')).collect();
    if all_digits(&digits) {
        match digits.len() {
            CPF_LEN => {
                return Ok(PixKey {
                    kind: PixKeyKind::Cpf,
                    value: digits,
                })
            }
            CNPJ_LEN => {
                return Ok(PixKey {
                    kind: PixKeyKind::Cnpj,
                    value: digits,
                })
            }
            _ => {}
        }
    }

    Err(ValidationError::new(
        "pix_key",
        "must be a CPF, CNPJ, e-mail, +55 phone or random (EVP) key",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_positive_amount() {
        assert!(validate_positive_amount(1).is_ok());
        assert!(validate_positive_amount(0).is_err());
        assert!(validate_positive_amount(-100).is_err());
    }

    #[test]
    fn parses_document_keys() {
        let cpf = parse_pix_key("123.456.789-09").unwrap();
        assert_eq!(cpf.kind(), PixKeyKind::Cpf);
        assert_eq!(cpf.value(), "12345678909");

        let cnpj = parse_pix_key("12.345.678/0001-95").unwrap();
        assert_eq!(cnpj.kind(), PixKeyKind::Cnpj);
        assert_eq!(cnpj.value(), "12345678000195");

        assert!(parse_pix_key("1234567890").is_err());
    }

    #[test]
    fn parses_contact_keys() {
        assert_eq!(
            parse_pix_key("+5511987654321").unwrap().kind(),
            PixKeyKind::Phone
        );
        assert!(parse_pix_key("+551198").is_err());

        let email = parse_pix_key(" User@Example.com ").unwrap();
        assert_eq!(email.kind(), PixKeyKind::Email);
        assert_eq!(email.value(), "user@example.com");
        assert!(parse_pix_key("user@localhost").is_err());
    }

    #[test]
    fn parses_random_keys() {
        let evp = parse_pix_key("7D9F0335-8DCC-4054-9BF9-0DBD61D36906").unwrap();
        assert_eq!(evp.kind(), PixKeyKind::Evp);
        assert_eq!(evp.value(), "7d9f0335-8dcc-4054-9bf9-0dbd61d36906");
    }

    #[test]
    fn rejects_garbage_keys() {
        assert!(parse_pix_key("").is_err());
        assert!(parse_pix_key("not a key").is_err());
        assert!(parse_pix_key(&"9".repeat(100)).is_err());
    }
}
