use spendlens_core::GatewayError;
use spendlens_core::account::AccountError;
use spendlens_core::session::SessionError;
use thiserror::Error;

/// Failure of a login or registration flow.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// Username or password left blank; nothing was sent.
    #[error("Username and password are required")]
    MissingCredentials,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Account(#[from] AccountError),

    /// The server answered but the session could not be established.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AuthError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingCredentials => self.to_string(),
            Self::Gateway(err) => err.user_message(),
            Self::Account(err) => err.user_message(),
            Self::Session(SessionError::Storage(_)) => {
                "Logged in, but the credentials could not be saved".to_string()
            }
            Self::Session(err) => err.to_string(),
        }
    }
}
