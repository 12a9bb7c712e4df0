//! Field checks shared by the board services. All of them run before any write.

use validator::{ValidateEmail, ValidateUrl};

use super::error::BoardError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Trimmed value, or `"{field} is required"` when absent or blank.
pub fn required(value: Option<String>, field: &str) -> Result<String, BoardError> {
    match value.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_string()),
        _ => Err(BoardError::validation(format!("{field} is required"))),
    }
}

/// Trimmed value with blanks collapsed to `None`.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

pub fn email(value: Option<String>) -> Result<String, BoardError> {
    let email = required(value, "email")?.to_lowercase();
    if email.validate_email() {
        Ok(email)
    } else {
        Err(BoardError::validation("Invalid email address"))
    }
}

pub fn password(value: Option<String>) -> Result<String, BoardError> {
    let password = value
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| BoardError::validation("password is required"))?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(BoardError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(password)
}

pub fn skills(value: Option<Vec<String>>) -> Result<Vec<String>, BoardError> {
    let raw = value.ok_or_else(|| BoardError::validation("skills is required"))?;
    let skills: Vec<String> = raw
        .into_iter()
        .map(|skill| skill.trim().to_string())
        .filter(|skill| !skill.is_empty())
        .collect();
    if skills.is_empty() {
        return Err(BoardError::validation("At least one skill is required"));
    }
    Ok(skills)
}

pub fn salary_range(min: Option<u32>, max: Option<u32>) -> Result<(), BoardError> {
    match (min, max) {
        (Some(min), Some(max)) if max < min => Err(BoardError::validation(
            "Maximum salary must be greater than minimum salary",
        )),
        _ => Ok(()),
    }
}

pub fn resume_url(value: &str) -> Result<(), BoardError> {
    if value.validate_url() {
        Ok(())
    } else {
        Err(BoardError::validation("Resume URL must be a valid URL"))
    }
}
