//! The current user's profile.

use spendlens_core::account::{AccountError, ProfileUpdate, UserProfile};
use spendlens_core::error::GatewayError;
use spendlens_core::gateway::Gateway;
use spendlens_core::transport::ApiRequest;

pub const ME_PATH: &str = "/api/v1/me";

/// Reads and updates `/api/v1/me`.
#[derive(Clone)]
pub struct AccountService {
    gateway: Gateway,
}

impl AccountService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Fetches the profile of the logged-in user.
    ///
    /// A 401 ends the session before `Unauthorized` is returned.
    pub async fn profile(&self) -> Result<UserProfile, GatewayError> {
        let response = self.gateway.send(ApiRequest::get(ME_PATH)).await?;
        response.json()
    }

    /// Validates `update` locally, then patches the profile.
    ///
    /// # Returns
    ///
    /// The profile as the server stored it.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, AccountError> {
        update.validate()?;

        let request = ApiRequest::patch(ME_PATH)
            .json(update)
            .map_err(|e| GatewayError::invalid_shape(e.to_string()))?;
        let profile: UserProfile = self.gateway.send(request).await?.json()?;

        tracing::info!(username = %profile.username, "Profile updated");
        Ok(profile)
    }
}
