//! Request Validators
//!
//! Presence checks only. No length limits, no format rules, no sanitising.

use crate::{
    error::{ApiError, FieldErrors},
    models::{CreateNewsRequest, Credentials},
};

const REQUIRED: &str = "is a required field";

fn require(fields: &mut FieldErrors, name: &str, value: &str) {
    if value.is_empty() {
        fields.insert(name.to_string(), REQUIRED.to_string());
    }
}

fn finish(fields: FieldErrors) -> Result<(), ApiError> {
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(fields))
    }
}

/// Signup and login both need an email and a password.
pub fn validate_credentials(req: &Credentials) -> Result<(), ApiError> {
    let mut fields = FieldErrors::new();
    require(&mut fields, "email", &req.email);
    require(&mut fields, "password", &req.password);
    finish(fields)
}

/// An article needs a title and content; an empty category list is allowed.
pub fn validate_create_news(req: &CreateNewsRequest) -> Result<(), ApiError> {
    let mut fields = FieldErrors::new();
    require(&mut fields, "Title", &req.title);
    require(&mut fields, "Content", &req.content);
    finish(fields)
}
