//! Account data: the current user's profile, registration input, and the
//! local form validation applied before anything is sent.

mod profile;
mod registration;
mod validation;

pub use profile::{ProfileUpdate, UserProfile};
pub use registration::{RegisterRequest, RegistrationForm};
pub use validation::{FieldError, ValidationErrors, is_valid_email};

use crate::error::GatewayError;
use thiserror::Error;

/// Failure of an account operation (registration, profile update).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Local validation failed; nothing was sent.
    #[error("{0}")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl AccountError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(errors) => errors.to_string(),
            Self::Gateway(err) => err.user_message(),
        }
    }
}

impl From<ValidationErrors> for AccountError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Invalid(errors)
    }
}
