//! Input validation for path identifiers and request bodies.
//!
//! Domain rules (names, amounts, splits) are checked by the services; this
//! module only guards the shape of what arrives over HTTP.

use axum::extract::FromRequest;

use super::error::ApiError;

/// `Json` body extractor whose rejections use the standard error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Validate a UUID
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// `validate_uuid`, reported as a single-field validation error
pub fn require_uuid(id: &str, field_name: &str) -> Result<(), ApiError> {
    validate_uuid(id, field_name).map_err(|e| ApiError::validation_field(field_name, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "group_id").is_ok());
        assert!(validate_uuid("", "group_id").is_err());
        assert!(validate_uuid("not-a-uuid", "group_id").is_err());
    }

    #[test]
    fn test_require_uuid_is_bad_request() {
        let err = require_uuid("42", "expense_id").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "[validation_error] Invalid expense_id format");
    }
}
