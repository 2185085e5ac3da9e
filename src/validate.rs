use thiserror::Error;

use crate::error::ApiError;
use crate::models::*;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 120;
pub const MAX_COMMENT_LEN: usize = 2000;

pub use fast_chemail::is_valid_email;

pub trait Validate {
    fn validate(&self) -> Result<(), Invalid>;
}

#[derive(Debug, Error, PartialEq)]
pub enum Invalid {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} is too long")]
    TooLong(&'static str),
    #[error("invalid email address")]
    Email,
    #[error("password must be at least 8 characters")]
    Password,
    #[error("invalid coordinates")]
    Coordinates,
    #[error("exactly one of password or oauth_identity is required")]
    Credentials,
}

impl From<Invalid> for ApiError {
    fn from(e: Invalid) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

pub fn required(field: &'static str, value: &str) -> Result<(), Invalid> {
    if value.trim().is_empty() {
        return Err(Invalid::Missing(field));
    }
    Ok(())
}

fn name(field: &'static str, value: &str) -> Result<(), Invalid> {
    required(field, value)?;
    if value.chars().count() > MAX_NAME_LEN {
        return Err(Invalid::TooLong(field));
    }
    Ok(())
}

fn cost(value: Option<&String>) -> Result<(), Invalid> {
    match value {
        Some(c) if c.chars().count() > MAX_NAME_LEN => Err(Invalid::TooLong("cost")),
        _ => Ok(()),
    }
}

pub fn password(value: &str) -> Result<(), Invalid> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(Invalid::Password);
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), Invalid> {
    if !is_valid_email(value) {
        return Err(Invalid::Email);
    }
    Ok(())
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

impl Validate for Coordinates {
    fn validate(&self) -> Result<(), Invalid> {
        if !self.is_valid() {
            return Err(Invalid::Coordinates);
        }
        Ok(())
    }
}

impl Validate for CreateAccountRequest {
    fn validate(&self) -> Result<(), Invalid> {
        email(&normalize_email(&self.email))?;
        name("username", &self.username)?;
        match (&self.password, &self.oauth_identity) {
            (Some(pw), None) => password(pw),
            (None, Some(identity)) => required("oauth_identity", identity),
            _ => Err(Invalid::Credentials),
        }
    }
}

impl Validate for UpdateAccountRequest {
    fn validate(&self) -> Result<(), Invalid> {
        if let Some(ref e) = self.email {
            email(&normalize_email(e))?;
        }
        if let Some(ref u) = self.username {
            name("username", u)?;
        }
        if let Some(ref pw) = self.password {
            password(pw)?;
        }
        Ok(())
    }
}

impl Validate for CreateLocationRequest {
    fn validate(&self) -> Result<(), Invalid> {
        name("name", &self.name)?;
        required("description", &self.description)?;
        cost(self.cost.as_ref())?;
        self.coordinates.validate()
    }
}

impl Validate for LocationUpdate {
    fn validate(&self) -> Result<(), Invalid> {
        name("name", &self.name)?;
        required("description", &self.description)?;
        cost(self.cost.as_ref())?;
        self.coordinates.validate()
    }
}

impl Validate for CreateCategoryRequest {
    fn validate(&self) -> Result<(), Invalid> {
        name("name", &self.name)
    }
}

impl Validate for CategoryUpdate {
    fn validate(&self) -> Result<(), Invalid> {
        name("name", &self.name)
    }
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> Result<(), Invalid> {
        name("title", &self.title)?;
        required("content", &self.content)
    }
}

impl Validate for UpdatePostRequest {
    fn validate(&self) -> Result<(), Invalid> {
        name("title", &self.title)?;
        required("content", &self.content)
    }
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> Result<(), Invalid> {
        required("content", &self.content)?;
        if self.content.chars().count() > MAX_COMMENT_LEN {
            return Err(Invalid::TooLong("content"));
        }
        Ok(())
    }
}

/// Trimmed; blank becomes `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Sorted, deduplicated category ids.
pub fn category_set(ids: &[Id]) -> Vec<Id> {
    let mut v = ids.to_vec();
    v.sort_unstable();
    v.dedup();
    v
}
