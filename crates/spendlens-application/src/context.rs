//! Wiring of the shared session, gateway, and services.

use crate::account_service::AccountService;
use crate::analysis_service::AnalysisService;
use crate::auth_usecase::AuthUseCase;
use spendlens_core::config::ClientConfig;
use spendlens_core::credentials::CredentialStore;
use spendlens_core::error::{Result, SpendError};
use spendlens_core::gateway::Gateway;
use spendlens_core::invitation::InvitationVerifier;
use spendlens_core::session::SessionManager;
use spendlens_core::transport::HttpTransport;
use spendlens_core::upload::UploadOrchestrator;
use spendlens_infrastructure::{ConfigService, ReqwestTransport, SpendLensPaths, TomlCredentialStore};
use std::sync::Arc;

/// Everything a front end needs, built around one [`SessionManager`].
///
/// All services share the same session, so a 401 seen by any of them is
/// observed by every subscriber.
pub struct ClientContext {
    pub config: ClientConfig,
    pub session: Arc<SessionManager>,
    pub gateway: Gateway,
    pub auth: AuthUseCase,
    pub account: AccountService,
    pub analysis: AnalysisService,
    pub uploads: UploadOrchestrator,
    pub invitations: InvitationVerifier,
}

impl ClientContext {
    /// Builds the context from explicit parts, restoring the session from
    /// `store`.
    ///
    /// # Errors
    ///
    /// Fails if the credential store cannot be read.
    pub fn bootstrap(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let session = Arc::new(SessionManager::restore(store)?);
        let gateway = Gateway::new(session.clone(), transport);

        tracing::debug!(
            base_url = %config.base_url(),
            status = ?session.status(),
            "Client context ready"
        );

        Ok(Self {
            auth: AuthUseCase::new(gateway.clone()),
            account: AccountService::new(gateway.clone()),
            analysis: AnalysisService::new(gateway.clone()),
            uploads: UploadOrchestrator::new(gateway.clone()),
            invitations: InvitationVerifier::new(gateway.clone()),
            config,
            session,
            gateway,
        })
    }

    /// Builds the production context: config file and credentials under
    /// `paths`, `reqwest` transport.
    pub fn from_paths(paths: &SpendLensPaths) -> Result<Self> {
        let config = ConfigService::new(paths.clone()).get_config();
        let store = Arc::new(TomlCredentialStore::open(paths)?);
        let transport = ReqwestTransport::new(&config)
            .map_err(|e| SpendError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Self::bootstrap(config, store, Arc::new(transport))
    }
}
