use serde::{Deserialize, Serialize};
use std::fmt;

/// Display name used when a token is present but no username was cached.
pub const FALLBACK_USERNAME: &str = "User";

/// The client's belief about whether the user is authenticated.
///
/// At most one `Session` is live per [`super::SessionManager`]; every observer
/// reads it through the manager.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated {
        access_token: String,
        refresh_token: String,
        username: String,
    },
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { username, .. } => Some(username),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { access_token, .. } => Some(access_token),
        }
    }

    /// Token-free view of this session.
    pub fn status(&self) -> SessionStatus {
        match self {
            Session::Anonymous => SessionStatus::Anonymous,
            Session::Authenticated { username, .. } => SessionStatus::Authenticated {
                username: username.clone(),
            },
        }
    }
}

// Tokens never reach logs through Debug.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Anonymous => write!(f, "Anonymous"),
            Session::Authenticated { username, .. } => f
                .debug_struct("Authenticated")
                .field("username", username)
                .field("access_token", &"<redacted>")
                .field("refresh_token", &"<redacted>")
                .finish(),
        }
    }
}

/// Public, token-free state carried by session notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Anonymous,
    Authenticated { username: String },
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated { .. })
    }
}

/// Credentials returned by a successful `/api/v1/token` exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// A bearer credential together with the session epoch it was read in.
///
/// The epoch lets the gateway tell whether an authorization failure still
/// applies to the live session or to one that has since been replaced.
#[derive(Clone, PartialEq, Eq)]
pub struct Bearer {
    pub token: String,
    pub epoch: u64,
}

impl fmt::Debug for Bearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bearer")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
