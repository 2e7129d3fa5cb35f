//! Authenticated request gateway.
//!
//! Every backend call goes through [`Gateway::send`]. The gateway attaches
//! the current access token, classifies the response, and ends the session
//! when the server reports an authorization failure. It never retries.

use crate::error::GatewayError;
use crate::session::{Bearer, SessionManager};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, ProgressSink};
use serde_json::Value;
use std::sync::Arc;

const HTTP_UNAUTHORIZED: u16 = 401;

/// Mediates all outbound calls and centralizes authorization-failure handling.
#[derive(Clone)]
pub struct Gateway {
    session: Arc<SessionManager>,
    transport: Arc<dyn HttpTransport>,
}

impl Gateway {
    pub fn new(session: Arc<SessionManager>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { session, transport }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Sends a request and classifies the outcome.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the request requires a session and none exists
    ///   (nothing is sent)
    /// - `Unauthorized` on HTTP 401 for an authenticated request. The session
    ///   is ended only if it is still the one whose token was sent; a late 401
    ///   for a session that already ended leaves the newer session alone
    /// - `Rejected` for any other non-2xx status
    /// - `Unreachable` if no response was received
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        self.dispatch(request, None).await
    }

    /// Like [`Gateway::send`], forwarding upload progress to `progress`.
    pub async fn send_with_progress(
        &self,
        request: ApiRequest,
        progress: ProgressSink,
    ) -> Result<ApiResponse, GatewayError> {
        self.dispatch(request, Some(progress)).await
    }

    async fn dispatch(
        &self,
        request: ApiRequest,
        progress: Option<ProgressSink>,
    ) -> Result<ApiResponse, GatewayError> {
        let bearer = if request.requires_auth() {
            match self.session.bearer() {
                Some(bearer) => Some(bearer),
                None => {
                    tracing::debug!(path = %request.path, "Refusing authenticated request without a session");
                    return Err(GatewayError::Unauthenticated);
                }
            }
        } else {
            None
        };

        let method = request.method;
        let path = request.path.clone();
        tracing::debug!(method = method.as_str(), path = %path, "Sending request");

        let response = self
            .transport
            .execute(request, bearer.as_ref().map(|b| b.token.clone()), progress)
            .await
            .map_err(|err| {
                tracing::warn!(method = method.as_str(), path = %path, error = %err, "Request failed");
                GatewayError::from(err)
            })?;

        tracing::debug!(
            method = method.as_str(),
            path = %path,
            status = response.status,
            "Received response"
        );

        match classify_response(response, bearer.is_some()) {
            Err(GatewayError::Unauthorized) => {
                self.handle_unauthorized(bearer.as_ref(), &path);
                Err(GatewayError::Unauthorized)
            }
            other => other,
        }
    }

    fn handle_unauthorized(&self, bearer: Option<&Bearer>, path: &str) {
        let Some(bearer) = bearer else {
            return;
        };
        tracing::warn!(path = %path, "Server rejected session credentials");
        if let Err(err) = self.session.invalidate_if_current(bearer.epoch) {
            tracing::error!(error = %err, "Session ended but credentials could not be cleared");
        }
    }
}

/// Maps a raw response onto the gateway taxonomy.
///
/// `authenticated` tells whether the request carried a bearer credential; a
/// 401 on a public request (e.g. wrong password at login) is an ordinary
/// rejection rather than a session failure.
pub fn classify_response(
    response: ApiResponse,
    authenticated: bool,
) -> Result<ApiResponse, GatewayError> {
    if response.is_success() {
        return Ok(response);
    }
    if response.status == HTTP_UNAUTHORIZED && authenticated {
        return Err(GatewayError::Unauthorized);
    }
    let detail = extract_detail(&response);
    Err(GatewayError::Rejected {
        status: response.status,
        detail,
    })
}

/// Extracts a human-readable error message from an error response body.
///
/// Recognized shapes, in order:
/// - `{"detail": "text"}`
/// - `{"detail": [{"loc": [..., "field"], "msg": "text"}, ...]}` rendered as
///   `field: text` entries joined with `, `
/// - `{"message": "text"}`
///
/// Anything else yields a generic message naming the status.
pub fn extract_detail(response: &ApiResponse) -> String {
    let generic = || format!("Request failed with status {}", response.status);

    let Some(body) = response.json_value() else {
        return generic();
    };

    match body.get("detail") {
        Some(Value::String(detail)) if !detail.is_empty() => return detail.clone(),
        Some(Value::Array(items)) => {
            let messages: Vec<String> = items.iter().filter_map(validation_message).collect();
            if !messages.is_empty() {
                return messages.join(", ");
            }
        }
        _ => {}
    }

    match body.get("message") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        _ => generic(),
    }
}

fn validation_message(item: &Value) -> Option<String> {
    let msg = item.get("msg")?.as_str()?;
    // `loc` is e.g. ["body", "email"]; the field is the last element.
    let field = item
        .get("loc")
        .and_then(Value::as_array)
        .and_then(|loc| loc.last())
        .map(|field| match field {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    Some(match field {
        Some(field) => format!("{}: {}", field, msg),
        None => msg.to_string(),
    })
}
