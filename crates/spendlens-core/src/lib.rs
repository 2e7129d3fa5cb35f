pub mod account;
pub mod analysis;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod invitation;
pub mod session;
pub mod transport;
pub mod upload;

// Re-export common error types
pub use error::{GatewayError, SpendError};

pub use config::ClientConfig;
pub use credentials::{CredentialKey, CredentialStore, InMemoryCredentialStore};
pub use gateway::Gateway;
pub use session::{SessionEvent, SessionManager, SessionStatus, TokenPair};
