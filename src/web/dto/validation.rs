//! Request body extraction and field validators.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::file::validate_name;
use crate::web::error::ApiError;

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON becomes a 400 `BAD_REQUEST`; rule violations become a 400
/// `VALIDATION_ERROR` carrying per-field messages.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = match Json::<T>::from_request(req, state).await {
            Ok(Json(body)) => body,
            Err(rejection) => return Err(json_rejection(rejection)),
        };
        body.validate().map_err(ApiError::from_validation_errors)?;
        Ok(ValidatedJson(body))
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    let message = match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected Content-Type: application/json".to_string()
        }
        other => format!("Invalid JSON: {}", other.body_text()),
    };
    ApiError::bad_request(message)
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// Rejects any control character, line breaks included.
pub fn no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(rule(
            "no_control_chars",
            "Must not contain control characters",
        ));
    }
    Ok(())
}

/// Rejects strings that are blank once trimmed.
pub fn not_empty_trimmed(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule("not_empty_trimmed", "Must not be empty"));
    }
    Ok(())
}

/// File and folder names: the same rule the drive applies on every write.
pub fn item_name(value: &str) -> Result<(), ValidationError> {
    validate_name(value).map(|_| ()).map_err(|_| {
        rule(
            "item_name",
            "Must be 1-255 characters without slashes or control characters",
        )
    })
}
