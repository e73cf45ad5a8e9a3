//! Input validation for search parameters.
//!
//! Normalizes the raw form values before anything is sent to the backend.

use crate::model::{SearchRequest, DEFAULT_LIMIT, MAX_LIMIT};
use thiserror::Error;

/// Raw user-supplied parameters, as typed (CLI flags or a form).
#[derive(Debug, Clone, Default)]
pub struct RawSearchInput {
    pub city: String,
    pub query: String,
    pub limit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
}

/// Validate and normalize raw input into a submittable request.
///
/// City and query are trimmed and must be non-empty. The limit is clamped
/// silently: non-numeric or non-positive input falls back to the default,
/// anything above the maximum is reduced to it. The caller is responsible
/// for reflecting the clamped limit back into any persisted form state.
pub fn validate(raw: &RawSearchInput) -> Result<SearchRequest, ValidationError> {
    let city = raw.city.trim();
    if city.is_empty() {
        return Err(ValidationError::MissingField { field: "city" });
    }
    let query = raw.query.trim();
    if query.is_empty() {
        return Err(ValidationError::MissingField { field: "query" });
    }

    Ok(SearchRequest {
        city: city.to_owned(),
        query: query.to_owned(),
        limit: clamp_limit(&raw.limit),
    })
}

fn clamp_limit(raw: &str) -> u32 {
    let parsed = raw.trim().parse::<i64>().ok().filter(|n| *n > 0);
    match parsed {
        Some(n) => (n as u64).min(u64::from(MAX_LIMIT)) as u32,
        None => DEFAULT_LIMIT,
    }
}
