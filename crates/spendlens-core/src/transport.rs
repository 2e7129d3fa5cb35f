//! HTTP transport abstraction.
//!
//! The transport is a capability: perform a request, get a response or a
//! transport failure. Status codes are not interpreted here; that is the
//! gateway's job.

use crate::error::GatewayError;
use crate::upload::UploadFile;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// HTTP method subset used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

/// Whether a request must carry the session's bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    Required,
    Public,
}

/// Request payload.
#[derive(Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// Single-file `multipart/form-data` upload.
    Multipart { field: String, file: UploadFile },
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Json(_) => write!(f, "Json(..)"),
            // Form bodies carry passwords.
            RequestBody::Form(pairs) => write!(f, "Form({} fields)", pairs.len()),
            RequestBody::Multipart { field, file } => f
                .debug_struct("Multipart")
                .field("field", field)
                .field("file", &file.name)
                .field("size", &file.size())
                .finish(),
        }
    }
}

/// A backend API request, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub auth: AuthPolicy,
    pub body: RequestBody,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            auth: AuthPolicy::Required,
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// Marks the request as not requiring a session.
    pub fn public(mut self) -> Self {
        self.auth = AuthPolicy::Public;
        self
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Fails only if `body` cannot be represented as JSON.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Sets a form-encoded body.
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Sets a single-file multipart body.
    pub fn multipart(mut self, field: impl Into<String>, file: UploadFile) -> Self {
        self.body = RequestBody::Multipart {
            field: field.into(),
            file,
        };
        self
    }

    pub fn requires_auth(&self) -> bool {
        self.auth == AuthPolicy::Required
    }
}

/// Raw backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Builds a response with a JSON body.
    pub fn with_json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    ///
    /// A body that does not match `T` violates the data contract and maps to
    /// [`GatewayError::InvalidShape`].
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            GatewayError::invalid_shape(format!("Failed to parse response body: {}", e))
        })
    }

    /// Parses the body as untyped JSON, `None` if it is not JSON at all.
    pub fn json_value(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure to obtain any response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Failed to build request: {0}")]
    Request(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        GatewayError::unreachable(err.to_string())
    }
}

/// Upload progress callback, called with `(bytes_sent, total_bytes)`.
pub type ProgressSink = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Performs HTTP requests against the backend.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Executes `request`, attaching `bearer` as an `Authorization: Bearer`
    /// header when present.
    ///
    /// `progress` is only meaningful for multipart bodies; transports report
    /// bytes handed to the network as the body is streamed.
    async fn execute(
        &self,
        request: ApiRequest,
        bearer: Option<String>,
        progress: Option<ProgressSink>,
    ) -> Result<ApiResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_builders() {
        let req = ApiRequest::post("/api/v1/token")
            .public()
            .form([("username", "alice"), ("password", "pw")]);
        assert_eq!(req.method, Method::Post);
        assert!(!req.requires_auth());
        assert!(matches!(req.body, RequestBody::Form(ref pairs) if pairs.len() == 2));
    }

    #[test]
    fn test_form_debug_hides_values() {
        let req = ApiRequest::post("/x").form([("password", "hunter2")]);
        let printed = format!("{:?}", req);
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_json_decode_failure_is_invalid_shape() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Payload {
            valid: bool,
        }

        let ok = ApiResponse::new(200, r#"{"valid":true}"#);
        assert!(ok.json::<Payload>().unwrap().valid);

        let bad = ApiResponse::new(200, "<html>");
        assert!(matches!(
            bad.json::<Payload>(),
            Err(GatewayError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_transport_error_maps_to_unreachable() {
        let err: GatewayError = TransportError::Timeout.into();
        assert!(matches!(err, GatewayError::Unreachable { .. }));
    }
}
