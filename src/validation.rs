/// Request validation
///
/// Request bodies derive `validator::Validate`; failures are flattened into
/// `FieldError`s so the client sees every offending field at once.
use crate::error::{FieldError, PlazaError, PlazaResult};
use validator::{Validate, ValidationError, ValidationErrors};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const CAPTION_MAX: u64 = 2200;
pub const COMMENT_MAX: u64 = 500;
pub const GROUP_NAME_MAX: u64 = 150;
pub const MESSAGE_MAX: u64 = 1000;

impl From<ValidationErrors> for PlazaError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                // Report fields under their wire (camelCase) names
                let field = camel_case(&field.to_string());
                errs.iter().map(move |err| {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| default_message(&field, err));
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();

        fields.sort_by(|a, b| a.field.cmp(&b.field));
        PlazaError::Validation(fields)
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn default_message(field: &str, err: &ValidationError) -> String {
    match &*err.code {
        "length" => {
            let min = err.params.get("min").and_then(|v| v.as_u64());
            let max = err.params.get("max").and_then(|v| v.as_u64());
            match (min, max) {
                (Some(min), Some(max)) => format!("{} must be between {} and {} characters", field, min, max),
                (Some(min), None) => format!("{} must be at least {} characters", field, min),
                (None, Some(max)) => format!("{} must be at most {} characters", field, max),
                (None, None) => format!("{} has an invalid length", field),
            }
        }
        "email" => format!("{} must be a valid email address", field),
        code => format!("{} is invalid ({})", field, code),
    }
}

/// Validate a request body, mapping failures to `PlazaError::Validation`
pub fn validate_request<T: Validate>(request: &T) -> PlazaResult<()> {
    request.validate().map_err(PlazaError::from)
}

/// Usernames: 3-30 ASCII letters, digits or underscores
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("username must be between {} and {} characters", USERNAME_MIN, USERNAME_MAX).into(),
        );
        return Err(err);
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        let mut err = ValidationError::new("username_chars");
        err.message = Some("username may only contain letters, numbers and underscores".into());
        return Err(err);
    }

    Ok(())
}

/// Reject strings that are empty once trimmed
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validate an optional caption outside of a derived struct (multipart forms)
pub fn validate_caption(caption: Option<&str>) -> PlazaResult<()> {
    if let Some(caption) = caption {
        if caption.chars().count() as u64 > CAPTION_MAX {
            return Err(PlazaError::invalid(
                "caption",
                format!("caption must be at most {} characters", CAPTION_MAX),
            ));
        }
    }
    Ok(())
}
