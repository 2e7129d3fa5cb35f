//! Invitation-code verification for the registration flow.
//!
//! Each edit of the code input supersedes any check in flight: the state
//! resets to `Unverified` at once and a late answer for an older code is
//! dropped.

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::transport::ApiRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Codes of this length or longer are checked without an explicit request.
pub const AUTO_VERIFY_LENGTH: usize = 6;
/// Shorter codes are never sent to the server.
pub const MIN_CODE_LENGTH: usize = 3;

static CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("invitation code pattern is valid"));

/// Why a code is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// Too short or contains characters the server never issues.
    Malformed,
    /// The server reported the code as not valid.
    Rejected,
    /// The server could not be asked.
    Unverifiable,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "Invitation code is malformed"),
            Self::Rejected => write!(f, "Invalid invitation code"),
            Self::Unverifiable => write!(f, "Could not verify invitation code"),
        }
    }
}

/// Validation result tied to the current invitation-code input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum InvitationCheck {
    Unverified,
    Verifying,
    Valid,
    Invalid(InvalidReason),
}

impl InvitationCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Deserialize)]
struct ValidationResponse {
    valid: bool,
}

/// Whether `code` may be sent to the server at all.
pub fn is_well_formed(code: &str) -> bool {
    code.len() >= MIN_CODE_LENGTH && CODE_PATTERN.is_match(code)
}

/// Asks the server about `code` without touching any verifier state.
///
/// # Errors
///
/// Any gateway error; a body without a boolean `valid` is `InvalidShape`.
pub async fn validate_code(gateway: &Gateway, code: &str) -> Result<bool, GatewayError> {
    let request = ApiRequest::get(format!("/api/v1/invitations/{}/validate", code)).public();
    let response = gateway.send(request).await?;
    let body: ValidationResponse = response.json()?;
    Ok(body.valid)
}

struct VerifierState {
    code: String,
    check: InvitationCheck,
    generation: u64,
}

/// Tracks the invitation-code input and its latest check.
pub struct InvitationVerifier {
    gateway: Gateway,
    state: Mutex<VerifierState>,
}

impl InvitationVerifier {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            state: Mutex::new(VerifierState {
                code: String::new(),
                check: InvitationCheck::Unverified,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VerifierState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records an edit of the input. The check resets to `Unverified`
    /// immediately, before any pending verification completes.
    pub fn on_input(&self, code: impl Into<String>) -> InvitationCheck {
        let mut state = self.lock();
        state.code = code.into().trim().to_string();
        state.check = InvitationCheck::Unverified;
        state.generation += 1;
        InvitationCheck::Unverified
    }

    pub fn code(&self) -> String {
        self.lock().code.clone()
    }

    pub fn check(&self) -> InvitationCheck {
        self.lock().check
    }

    /// Whether the current input is long enough to verify without being asked.
    pub fn should_auto_verify(&self) -> bool {
        let state = self.lock();
        state.check == InvitationCheck::Unverified && state.code.len() >= AUTO_VERIFY_LENGTH
    }

    /// Verifies the current input.
    ///
    /// Returns the resulting state. When the input changed while the request
    /// was in flight, its answer is discarded and the newer state is returned.
    pub async fn verify(&self) -> InvitationCheck {
        let (code, generation) = {
            let mut state = self.lock();
            if !is_well_formed(&state.code) {
                state.check = InvitationCheck::Invalid(InvalidReason::Malformed);
                return state.check;
            }
            state.check = InvitationCheck::Verifying;
            (state.code.clone(), state.generation)
        };

        tracing::debug!(generation, "Verifying invitation code");
        let result = match validate_code(&self.gateway, &code).await {
            Ok(true) => InvitationCheck::Valid,
            Ok(false) => InvitationCheck::Invalid(InvalidReason::Rejected),
            Err(err) => {
                tracing::warn!(error = %err, "Invitation code verification failed");
                InvitationCheck::Invalid(InvalidReason::Unverifiable)
            }
        };

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(generation, "Dropping stale invitation check");
            return state.check;
        }
        state.check = result;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;
    use crate::session::SessionManager;
    use crate::transport::{ApiResponse, HttpTransport, ProgressSink, TransportError};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct InvitationTransport {
        response: Result<ApiResponse, TransportError>,
        gate: Option<Arc<Notify>>,
        paths: Mutex<Vec<(String, bool)>>,
    }

    impl InvitationTransport {
        fn new(response: Result<ApiResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                gate: None,
                paths: Mutex::new(Vec::new()),
            })
        }

        fn gated(response: Result<ApiResponse, TransportError>, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                response,
                gate: Some(gate),
                paths: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for InvitationTransport {
        async fn execute(
            &self,
            request: ApiRequest,
            bearer: Option<String>,
            _progress: Option<ProgressSink>,
        ) -> Result<ApiResponse, TransportError> {
            self.paths
                .lock()
                .unwrap()
                .push((request.path.clone(), bearer.is_some()));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.response.clone()
        }
    }

    fn verifier(transport: Arc<InvitationTransport>) -> InvitationVerifier {
        let store = Arc::new(InMemoryCredentialStore::new());
        let session = Arc::new(SessionManager::anonymous(store));
        InvitationVerifier::new(Gateway::new(session, transport))
    }

    #[tokio::test]
    async fn test_valid_code_without_session() {
        let transport = InvitationTransport::new(Ok(ApiResponse::with_json(200, &json!({"valid": true}))));
        let verifier = verifier(transport.clone());

        verifier.on_input("VALID1");
        assert!(verifier.should_auto_verify());
        assert_eq!(verifier.verify().await, InvitationCheck::Valid);
        assert!(!verifier.should_auto_verify());

        let paths = transport.paths.lock().unwrap();
        assert_eq!(
            paths.as_slice(),
            &[("/api/v1/invitations/VALID1/validate".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_edit_resets_to_unverified() {
        let transport = InvitationTransport::new(Ok(ApiResponse::with_json(200, &json!({"valid": true}))));
        let verifier = verifier(transport);

        verifier.on_input("VALID1");
        verifier.verify().await;
        assert_eq!(verifier.check(), InvitationCheck::Valid);

        assert_eq!(verifier.on_input("VALID12"), InvitationCheck::Unverified);
        assert_eq!(verifier.check(), InvitationCheck::Unverified);
    }

    #[tokio::test]
    async fn test_stale_answer_is_dropped() {
        let gate = Arc::new(Notify::new());
        let transport = InvitationTransport::gated(
            Ok(ApiResponse::with_json(200, &json!({"valid": true}))),
            gate.clone(),
        );
        let verifier = Arc::new(verifier(transport));

        verifier.on_input("VALID1");
        let pending = {
            let verifier = verifier.clone();
            tokio::spawn(async move { verifier.verify().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(verifier.check(), InvitationCheck::Verifying);

        verifier.on_input("OTHER2");
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), InvitationCheck::Unverified);
        assert_eq!(verifier.check(), InvitationCheck::Unverified);
        assert_eq!(verifier.code(), "OTHER2");
    }

    #[tokio::test]
    async fn test_rejected_and_unverifiable() {
        let rejected = verifier(InvitationTransport::new(Ok(ApiResponse::with_json(
            200,
            &json!({"valid": false}),
        ))));
        rejected.on_input("NOPE99");
        assert_eq!(
            rejected.verify().await,
            InvitationCheck::Invalid(InvalidReason::Rejected)
        );

        let offline = verifier(InvitationTransport::new(Err(TransportError::Timeout)));
        offline.on_input("VALID1");
        assert_eq!(
            offline.verify().await,
            InvitationCheck::Invalid(InvalidReason::Unverifiable)
        );

        let not_found = verifier(InvitationTransport::new(Ok(ApiResponse::with_json(
            404,
            &json!({"detail": "Not Found"}),
        ))));
        not_found.on_input("VALID1");
        assert_eq!(
            not_found.verify().await,
            InvitationCheck::Invalid(InvalidReason::Unverifiable)
        );
    }

    #[tokio::test]
    async fn test_malformed_codes_are_not_sent() {
        let transport = InvitationTransport::new(Ok(ApiResponse::with_json(200, &json!({"valid": true}))));
        let verifier = verifier(transport.clone());

        for code in ["ab", "has space", "a/b/c", ""] {
            verifier.on_input(code);
            assert_eq!(
                verifier.verify().await,
                InvitationCheck::Invalid(InvalidReason::Malformed),
                "code {:?}",
                code
            );
        }
        assert!(transport.paths.lock().unwrap().is_empty());
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("abc"));
        assert!(is_well_formed("INV-2024_x"));
        assert!(!is_well_formed("ab"));
        assert!(!is_well_formed("abc?d"));
    }
}
