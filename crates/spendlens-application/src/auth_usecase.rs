//! Login, registration, and logout.

use crate::error::AuthError;
use spendlens_core::account::{AccountError, RegistrationForm};
use spendlens_core::error::{GatewayError, SpendError};
use spendlens_core::gateway::Gateway;
use spendlens_core::session::{SessionStatus, TokenPair};
use spendlens_core::transport::ApiRequest;

pub const TOKEN_PATH: &str = "/api/v1/token";
pub const REGISTER_PATH: &str = "/api/v1/register";

/// Use case for moving the session between anonymous and authenticated.
///
/// All transitions go through the gateway's [`SessionManager`], so every
/// subscriber sees them.
///
/// [`SessionManager`]: spendlens_core::session::SessionManager
#[derive(Clone)]
pub struct AuthUseCase {
    gateway: Gateway,
}

impl AuthUseCase {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Exchanges a username and password for a token pair and establishes
    /// the session.
    ///
    /// # Arguments
    ///
    /// * `username` - Account name; also stored as the display name
    /// * `password` - Sent form-encoded, never logged
    ///
    /// # Errors
    ///
    /// - `MissingCredentials` for a blank username or password
    /// - `Gateway(Rejected)` when the server refuses the credentials
    /// - `Gateway(InvalidShape)` when the response has no token pair
    /// - `Session` when the token pair is empty or cannot be persisted
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionStatus, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let request = ApiRequest::post(TOKEN_PATH)
            .public()
            .form([("username", username), ("password", password)]);
        let response = self.gateway.send(request).await?;
        let tokens: TokenPair = response.json()?;

        let session = self.gateway.session();
        session.establish(tokens, username)?;
        Ok(session.status())
    }

    /// Validates the form locally, then creates the account.
    ///
    /// Does not log in; see [`AuthUseCase::register_and_login`].
    ///
    /// # Errors
    ///
    /// - `Invalid` with every failing field; nothing was sent
    /// - `Gateway(Rejected)` with the server's detail, e.g. an invalid
    ///   invitation code or FastAPI field errors
    pub async fn register(&self, form: &RegistrationForm) -> Result<(), AccountError> {
        form.validate()?;

        let request = ApiRequest::post(REGISTER_PATH)
            .public()
            .json(&form.to_request())
            .map_err(|e| GatewayError::invalid_shape(e.to_string()))?;
        self.gateway.send(request).await?;

        tracing::info!(username = %form.username.trim(), "Account registered");
        Ok(())
    }

    /// Registers, then logs in with the same credentials.
    pub async fn register_and_login(
        &self,
        form: &RegistrationForm,
    ) -> Result<SessionStatus, AuthError> {
        self.register(form).await?;
        self.login(&form.username, &form.password).await
    }

    /// Ends the session. Returns whether a transition happened.
    pub fn logout(&self) -> Result<bool, SpendError> {
        let transitioned = self.gateway.session().logout()?;
        if transitioned {
            tracing::info!("Logged out");
        }
        Ok(transitioned)
    }
}
