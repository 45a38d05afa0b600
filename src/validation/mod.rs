/// Form input validation
///
/// Password policy, contact field normalization and comment length rules.
/// Struct-level rules are declared with `validator` derives on the form
/// types and funneled through [`check`].
use crate::error::{AppError, AppResult};
use validator::{Validate, ValidationErrors};

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 20;
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*";
pub const COMMENT_MAX_LENGTH: usize = 2000;

/// Run derived validation rules and surface the first failure as a
/// validation error
pub fn check<T: Validate>(form: &T) -> AppResult<()> {
    form.validate()
        .map_err(|errors| AppError::Validation(first_message(&errors)))
}

fn first_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<(String, String)> = errors
        .field_errors()
        .iter()
        .filter_map(|(field, list)| {
            list.first().map(|e| {
                let message = match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value for {}", field),
                };
                (field.to_string(), message)
            })
        })
        .collect();
    messages.sort();

    messages
        .into_iter()
        .next()
        .map(|(_, message)| message)
        .unwrap_or_else(|| "Invalid input".to_string())
}

/// Enforce the password policy: 8 to 20 characters with at least one digit
/// and one of `!@#$%^&*`
pub fn validate_password(password: &str) -> AppResult<()> {
    let length = password.chars().count();

    if !(PASSWORD_MIN_LENGTH..=PASSWORD_MAX_LENGTH).contains(&length) {
        return Err(AppError::Validation(format!(
            "Password must be between {} and {} characters",
            PASSWORD_MIN_LENGTH, PASSWORD_MAX_LENGTH
        )));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Password must contain at least one number".to_string(),
        ));
    }

    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(AppError::Validation(format!(
            "Password must contain at least one special character ({})",
            PASSWORD_SPECIAL_CHARS
        )));
    }

    Ok(())
}

/// Check a new password against the policy and its confirmation
pub fn validate_new_password(password: &str, confirmation: &str) -> AppResult<()> {
    validate_password(password)?;

    if password != confirmation {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }

    Ok(())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Treat blank optional form fields as absent
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize a Brazilian phone number to `+55 (11) 91234-5678`
///
/// Accepts 10 (landline) or 11 (mobile) national digits, optionally prefixed
/// with the 55 country code. Blank input yields `None`.
pub fn format_phone(value: &str) -> AppResult<Option<String>> {
    let mut number = digits(value);
    if number.is_empty() {
        return Ok(None);
    }

    if number.len() > 11 && number.starts_with("55") {
        number = number[2..].to_string();
    }

    let formatted = match number.len() {
        11 => format!("+55 ({}) {}-{}", &number[..2], &number[2..7], &number[7..]),
        10 => format!("+55 ({}) {}-{}", &number[..2], &number[2..6], &number[6..]),
        _ => {
            return Err(AppError::Validation(
                "Phone number must have a 2-digit area code and 8 or 9 digits".to_string(),
            ))
        }
    };

    Ok(Some(formatted))
}

/// Normalize a CEP (postal code) to `01001-000`. Blank input yields `None`.
pub fn format_cep(value: &str) -> AppResult<Option<String>> {
    let cep = digits(value);
    if cep.is_empty() {
        return Ok(None);
    }

    if cep.len() != 8 {
        return Err(AppError::Validation("CEP must have 8 digits".to_string()));
    }

    Ok(Some(format!("{}-{}", &cep[..5], &cep[5..])))
}

/// Trim a comment body and enforce the length bounds
pub fn validate_comment_body(body: &str, min_length: usize) -> AppResult<String> {
    let trimmed = body.trim();
    let length = trimmed.chars().count();

    if length < min_length {
        return Err(AppError::Validation(format!(
            "Comment must be at least {} characters long",
            min_length
        )));
    }

    if length > COMMENT_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "Comment cannot exceed {} characters",
            COMMENT_MAX_LENGTH
        )));
    }

    Ok(trimmed.to_string())
}
