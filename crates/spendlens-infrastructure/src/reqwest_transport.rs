//! [`HttpTransport`] over `reqwest`.
//!
//! Multipart bodies are streamed in fixed-size chunks so upload progress can
//! be reported as bytes are handed to the connection.

use futures::Stream;
use spendlens_core::config::ClientConfig;
use spendlens_core::transport::{
    ApiRequest, ApiResponse, HttpTransport, Method, ProgressSink, RequestBody, TransportError,
};
use spendlens_core::upload::UploadFile;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("spendlens/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Bytes per streamed multipart chunk, and so per progress report.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Sends backend requests with `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl ReqwestTransport {
    /// Builds a transport for the configured backend.
    ///
    /// # Errors
    ///
    /// `TransportError::Request` if the TLS backend cannot be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            request_timeout: config.request_timeout(),
            upload_timeout: config.upload_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: ApiRequest,
        bearer: Option<String>,
        progress: Option<ProgressSink>,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        let timeout = match request.body {
            RequestBody::Multipart { .. } => self.upload_timeout,
            _ => self.request_timeout,
        };

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url)
            .timeout(timeout);

        if let Some(token) = bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Multipart { field, file } => {
                builder.multipart(multipart_form(field, file, progress)?)
            }
        };

        tracing::debug!(method = request.method.as_str(), url = %url, "Sending request");

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        tracing::debug!(status, bytes = body.len(), "Received response");
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
    }
}

fn multipart_form(
    field: String,
    file: UploadFile,
    progress: Option<ProgressSink>,
) -> Result<reqwest::multipart::Form, TransportError> {
    let mime = file
        .mime_type()
        .map(str::to_string)
        .unwrap_or_else(|| mime_guess::from_path(&file.name).first_or_octet_stream().to_string());
    let total = file.size();

    let body = reqwest::Body::wrap_stream(chunk_stream(file.bytes.clone(), progress));
    let part = reqwest::multipart::Part::stream_with_length(body, total)
        .file_name(file.name.clone())
        .mime_str(&mime)
        .map_err(|e| TransportError::Request(e.to_string()))?;

    Ok(reqwest::multipart::Form::new().part(field, part))
}

/// Splits `bytes` into chunks, reporting `(sent, total)` as each is yielded.
fn chunk_stream(
    bytes: Arc<Vec<u8>>,
    progress: Option<ProgressSink>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    let total = bytes.len() as u64;
    let chunks = (0..bytes.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(move |start| {
            let end = (start + UPLOAD_CHUNK_SIZE).min(bytes.len());
            let chunk = bytes[start..end].to_vec();
            if let Some(report) = &progress {
                report(end as u64, total);
            }
            Ok::<_, std::io::Error>(chunk)
        });
    futures::stream::iter(chunks)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() {
        TransportError::Request(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
