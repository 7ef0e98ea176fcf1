//! # Common API Types
//!
//! Request-body plumbing shared by every handler: bodies are decoded into
//! explicit structs and validated before any business logic runs.

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::{ApiError, validation_error};

/// Boundary validation for request bodies.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// JSON body that has been decoded and passed [`Validate::validate`].
///
/// Malformed JSON, unknown fields and failed validation are all 400
/// problem+json responses.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Non-empty after trimming and at most `max` characters.
pub fn require_text(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    let length = value.trim().chars().count();
    if length == 0 {
        return Err(validation_error(
            &format!("{field} is required"),
            json!({ "field": field, "message": "must not be empty" }),
        ));
    }
    if length > max {
        return Err(validation_error(
            &format!("{field} is too long"),
            json!({ "field": field, "max_length": max, "actual_length": length }),
        ));
    }
    Ok(())
}

/// Like [`require_text`] for optional fields; `None` passes.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<(), ApiError> {
    match value {
        Some(value) => require_text(field, value, max),
        None => Ok(()),
    }
}
