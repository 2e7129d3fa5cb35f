use super::validation::{ValidationErrors, check_password, is_valid_email};
use serde::Serialize;
use std::fmt;

/// Input of the registration form.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub invitation_code: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("invitation_code", &self.invitation_code)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

/// JSON body of `POST /api/v1/register`.
#[derive(Serialize)]
pub struct RegisterRequest<'a> {
    pub invitation_code: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub bio: &'a str,
    pub avatar_url: &'a str,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
    pub password: &'a str,
}

impl RegistrationForm {
    /// Validates every field, collecting all failures.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.invitation_code.trim().is_empty() {
            errors.push("invitation_code", "Invitation code is required");
        }
        let username_len = self.username.trim().chars().count();
        if username_len < 3 {
            errors.push("username", "Username must be at least 3 characters");
        } else if username_len > 50 {
            errors.push("username", "Username cannot exceed 50 characters");
        }
        if !is_valid_email(self.email.trim()) {
            errors.push("email", "Please enter a valid email address");
        }
        check_password(&self.password, &mut errors);
        if self.password != self.confirm_password {
            errors.push("confirm_password", "Passwords do not match");
        }

        errors.into_result()
    }

    /// Builds the request body with the defaults new accounts start with.
    pub fn to_request(&self) -> RegisterRequest<'_> {
        RegisterRequest {
            invitation_code: self.invitation_code.trim(),
            username: self.username.trim(),
            email: self.email.trim(),
            first_name: self.first_name.as_deref().unwrap_or(""),
            last_name: self.last_name.as_deref().unwrap_or(""),
            bio: "",
            avatar_url: "",
            is_active: true,
            is_superuser: false,
            is_verified: false,
            password: &self.password,
        }
    }
}
