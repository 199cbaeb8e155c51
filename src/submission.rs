//! Contact-form submissions and their validation.

use lettre::Address;
use serde::Deserialize;

/// Length limits count Unicode scalar values, not UTF-16 code units.
pub const NAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 50;
pub const MESSAGE_MAX_CHARS: usize = 2000;

/// Raw JSON body of `POST /api/sendMail`.
///
/// Fields are optional here so that a missing field is reported by
/// [`validate`] rather than by the JSON decoder.
#[derive(Debug, Default, Deserialize)]
pub struct ContactPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A validated contact submission. Lives only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub name: String,
    pub email: Address,
    pub message: String,
}

/// Reason a submission was refused.
///
/// Only logged; the visitor always gets the same generic reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Body is not a contact payload: {0}")]
    Malformed(String),
    #[error("Field `{0}` is missing")]
    Missing(&'static str),
    #[error("Field `{field}` must hold between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },
    #[error("Field `email` is not a mail address")]
    InvalidEmail,
}

fn check_length(
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Result<String, ValidationError> {
    let value = value.ok_or(ValidationError::Missing(field))?;
    let chars = value.chars().count();
    if chars == 0 || chars > max {
        return Err(ValidationError::Length { field, min: 1, max });
    }
    Ok(value)
}

/// Requires a dotted host name ending in an alphabetic top-level label.
///
/// Rejects bare hosts, IP literals and labels outside `[A-Za-z0-9-]`.
fn has_public_domain(address: &Address) -> bool {
    let domain = address.domain();
    let Some((_, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
        && domain.split('.').all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Checks presence, length and format of every field.
pub fn validate(payload: ContactPayload) -> Result<Submission, ValidationError> {
    let name = check_length("name", payload.name, NAME_MAX_CHARS)?;
    let email = check_length("email", payload.email, EMAIL_MAX_CHARS)?;
    let message = check_length("message", payload.message, MESSAGE_MAX_CHARS)?;

    let email = email
        .parse::<Address>()
        .map_err(|_| ValidationError::InvalidEmail)?;
    if !has_public_domain(&email) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(Submission {
        name,
        email,
        message,
    })
}

impl Submission {
    /// Decodes a JSON request body and validates it.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        let payload: ContactPayload = serde_json::from_slice(body)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        validate(payload)
    }
}
