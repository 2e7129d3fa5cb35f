use super::bus::{SessionBus, Subscription};
use super::event::{SessionEvent, TransitionCause};
use super::model::{Bearer, FALLBACK_USERNAME, Session, SessionStatus, TokenPair};
use crate::credentials::{CredentialKey, CredentialStore, StoredCredentials};
use crate::error::SpendError;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors returned when establishing a session.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// The credential exchange returned an empty token.
    #[error("Missing {0} in credential exchange")]
    MissingToken(&'static str),

    /// No username was supplied.
    #[error("Username cannot be empty")]
    EmptyUsername,

    /// Credentials could not be persisted.
    #[error(transparent)]
    Storage(#[from] SpendError),
}

struct SessionState {
    session: Session,
    epoch: u64,
}

/// The authentication state machine.
///
/// `SessionManager` is responsible for:
/// - Rehydrating the session from the credential store on startup
/// - Establishing a session after a successful credential exchange
/// - Ending the session on logout or on an authorization failure
/// - Broadcasting every transition on its [`SessionBus`]
///
/// It is the only writer of the credential store. Each transition bumps the
/// session epoch, which callers use to detect that the session changed while
/// a request was in flight.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    bus: SessionBus,
}

impl SessionManager {
    /// Creates an anonymous manager without reading the store.
    pub fn anonymous(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            state: RwLock::new(SessionState {
                session: Session::Anonymous,
                epoch: 0,
            }),
            bus: SessionBus::new(),
        }
    }

    /// Rehydrates the session from the credential store.
    ///
    /// A stored token is trusted without contacting the server: an expired or
    /// revoked token is only discovered by the first authenticated request.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn restore(store: Arc<dyn CredentialStore>) -> Result<Self, SpendError> {
        let stored = StoredCredentials::load_from(store.as_ref())?;
        let manager = Self::anonymous(store);

        if !stored.is_empty() {
            let username = stored
                .username
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| FALLBACK_USERNAME.to_string());
            tracing::debug!(username = %username, "Restored session from credential store");
            manager.write_state().session = Session::Authenticated {
                access_token: stored.token.unwrap_or_default(),
                refresh_token: stored.refresh_token.unwrap_or_default(),
                username,
            };
        }

        Ok(manager)
    }

    /// Current session snapshot.
    pub fn current(&self) -> Session {
        self.read_state().session.clone()
    }

    /// Token-free view of the current session.
    pub fn status(&self) -> SessionStatus {
        self.read_state().session.status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().session.is_authenticated()
    }

    /// Number of transitions so far.
    pub fn epoch(&self) -> u64 {
        self.read_state().epoch
    }

    /// The access token to attach to a request, if authenticated.
    pub fn bearer(&self) -> Option<Bearer> {
        let state = self.read_state();
        state.session.access_token().map(|token| Bearer {
            token: token.to_string(),
            epoch: state.epoch,
        })
    }

    /// True when a page that requires authentication should redirect to login.
    pub fn requires_login(&self) -> bool {
        !self.is_authenticated()
    }

    /// The notification bus carrying this manager's transitions.
    pub fn bus(&self) -> &SessionBus {
        &self.bus
    }

    /// Shorthand for `bus().subscribe(..)`.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(listener)
    }

    /// Transitions to `Authenticated` after a successful credential exchange.
    ///
    /// All three credential fields are persisted before the in-memory state
    /// changes. If persisting fails the store is cleared and the client ends
    /// up anonymous.
    ///
    /// # Errors
    ///
    /// - `MissingToken` if either token is empty (no transition happens)
    /// - `EmptyUsername` if the username is empty (no transition happens)
    /// - `Storage` if the store rejects the write
    pub fn establish(&self, tokens: TokenPair, username: &str) -> Result<(), SessionError> {
        if tokens.access_token.is_empty() {
            return Err(SessionError::MissingToken("access_token"));
        }
        if tokens.refresh_token.is_empty() {
            return Err(SessionError::MissingToken("refresh_token"));
        }
        let username = username.trim();
        if username.is_empty() {
            return Err(SessionError::EmptyUsername);
        }

        {
            let mut state = self.write_state();

            if let Err(err) = self.persist(&tokens, username) {
                tracing::warn!(error = %err, "Failed to persist credentials, dropping session");
                if let Err(clear_err) = self.store.clear() {
                    tracing::error!(error = %clear_err, "Failed to clear credential store");
                }
                if state.session.is_authenticated() {
                    self.transition(&mut state, Session::Anonymous, TransitionCause::PersistFailed);
                }
                drop(state);
                self.bus.flush();
                return Err(err.into());
            }

            let next = Session::Authenticated {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                username: username.to_string(),
            };
            self.transition(&mut state, next, TransitionCause::Login);
        }

        tracing::info!(username = %username, "Session established");
        self.bus.flush();
        Ok(())
    }

    /// Explicit logout.
    ///
    /// Returns `Ok(true)` if a transition happened and `Ok(false)` if the
    /// client was already anonymous (the store is cleared either way).
    ///
    /// # Errors
    ///
    /// Returns an error if the store could not be cleared. The in-memory
    /// session is anonymous regardless.
    pub fn logout(&self) -> Result<bool, SpendError> {
        self.end_session(None, TransitionCause::Logout)
    }

    /// Ends the session after the server rejected a request made with the
    /// credential read at `epoch`.
    ///
    /// A rejection that belongs to an older session (the epoch moved on since
    /// the request was sent) is ignored and `Ok(false)` is returned.
    pub fn invalidate_if_current(&self, epoch: u64) -> Result<bool, SpendError> {
        self.end_session(Some(epoch), TransitionCause::Unauthorized)
    }

    fn end_session(
        &self,
        expected_epoch: Option<u64>,
        cause: TransitionCause,
    ) -> Result<bool, SpendError> {
        let (transitioned, cleared) = {
            let mut state = self.write_state();

            if let Some(epoch) = expected_epoch {
                if state.epoch != epoch {
                    tracing::debug!(
                        expected = epoch,
                        actual = state.epoch,
                        "Ignoring authorization failure from a previous session"
                    );
                    return Ok(false);
                }
            }

            let cleared = self.store.clear();
            let transitioned = state.session.is_authenticated();
            if transitioned {
                self.transition(&mut state, Session::Anonymous, cause);
            }
            (transitioned, cleared)
        };

        if transitioned {
            tracing::info!(cause = ?cause, "Session ended");
            self.bus.flush();
        }

        if let Err(err) = &cleared {
            tracing::error!(error = %err, "Failed to clear credential store");
        }
        cleared.map(|_| transitioned)
    }

    fn persist(&self, tokens: &TokenPair, username: &str) -> Result<(), SpendError> {
        self.store.set(CredentialKey::Token, &tokens.access_token)?;
        self.store
            .set(CredentialKey::RefreshToken, &tokens.refresh_token)?;
        self.store.set(CredentialKey::Username, username)?;
        Ok(())
    }

    /// Swaps the session and queues the notification while the state lock is
    /// held, so queue order equals transition order.
    fn transition(&self, state: &mut SessionState, next: Session, cause: TransitionCause) {
        let previous = state.session.status();
        state.session = next;
        state.epoch += 1;
        self.bus.enqueue(SessionEvent {
            previous,
            current: state.session.status(),
            cause,
            epoch: state.epoch,
        });
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
