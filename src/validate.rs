//! Request payload validation, run before any store access.
//!
//! Mirrors the registration rules: username at least 5 alphanumeric
//! characters, non-empty password, plausible email, birthday as YYYY-MM-DD.
//! All failing fields are reported together.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{ApiError, FieldError};

/// Incoming body for registration and profile update.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub username: String,
    pub password: String,
    pub email: String,
    pub birthday: String,
}

pub const MIN_USERNAME_LEN: usize = 5;

/// Validate a registration/update payload. Returns the parsed birthday on
/// success, or a `Validation` error listing every failing field.
pub fn check_user(payload: &UserPayload) -> Result<NaiveDate, ApiError> {
    let mut errors = Vec::new();

    if payload.username.chars().count() < MIN_USERNAME_LEN {
        errors.push(FieldError {
            field: "username",
            message: format!("username must be at least {MIN_USERNAME_LEN} characters"),
        });
    } else if !payload.username.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(FieldError {
            field: "username",
            message: "username must contain only alphanumeric characters".into(),
        });
    }

    if payload.password.is_empty() {
        errors.push(FieldError {
            field: "password",
            message: "password is required".into(),
        });
    }

    if !email_shape_ok(&payload.email) {
        errors.push(FieldError {
            field: "email",
            message: "not a valid email address".into(),
        });
    }

    let birthday = match NaiveDate::parse_from_str(&payload.birthday, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(FieldError {
                field: "birthday",
                message: "not a valid date, expected YYYY-MM-DD".into(),
            });
            None
        }
    };

    match birthday {
        Some(date) if errors.is_empty() => Ok(date),
        _ => Err(ApiError::Validation(errors)),
    }
}

/// Cheap structural check: exactly one `@`, non-empty local part, dotted
/// domain, no whitespace. Deliverability is not our problem.
fn email_shape_ok(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
