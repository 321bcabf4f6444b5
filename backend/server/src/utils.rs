use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::AppError;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

static DUPLICATE_SLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^:]/)/+").expect("slash pattern is valid"));

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Trims `value` and checks its length in characters.
pub fn bounded(field: &str, value: &str, min: usize, max: usize) -> Result<String, AppError> {
    let value = value.trim();
    let length = value.chars().count();

    if length < min {
        return Err(AppError::BadRequest(format!(
            "\"{field}\" length must be at least {min} characters long"
        )));
    }
    if length > max {
        return Err(AppError::BadRequest(format!(
            "\"{field}\" length must be less than or equal to {max} characters long"
        )));
    }

    Ok(value.to_string())
}

/// Empty strings count as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Joins an origin and a path, collapsing repeated slashes outside the scheme.
pub fn join_url(origin: &str, path: &str) -> String {
    let joined = format!("{origin}/{path}");

    DUPLICATE_SLASHES.replace_all(&joined, "$1").into_owned()
}

/// RFC 3339, or a bare `datetime-local` value taken as UTC.
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|time| time.and_utc())
}
