use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Invoice file formats the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceFormat {
    Pdf,
    Jpeg,
    Png,
}

impl InvoiceFormat {
    /// Accepted file extensions, lowercase.
    pub const EXTENSIONS: [&'static str; 4] = ["pdf", "jpg", "jpeg", "png"];

    /// Detects the format from a file name's extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// An opaque binary file selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Arc<Vec<u8>>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: Arc::new(bytes),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn format(&self) -> Option<InvoiceFormat> {
        InvoiceFormat::from_file_name(&self.name)
    }

    /// Explicit content type, else the one implied by the extension.
    pub fn mime_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .or_else(|| self.format().map(|f| f.mime_type()))
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.size())
            .finish()
    }
}

/// Why an upload did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UploadFailure {
    /// No session; the gateway was never invoked.
    NotAuthenticated,
    /// `start_selected` was called with nothing selected.
    NoFileSelected,
    /// The file extension is not one of the accepted invoice formats.
    UnsupportedFormat(String),
    /// The server rejected the session; the client is now logged out.
    SessionExpired,
    /// The server refused the file.
    ServerRejected(String),
    /// The request never got a response.
    NetworkError,
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "Please login first"),
            Self::NoFileSelected => write!(f, "Please select a file first"),
            Self::UnsupportedFormat(name) => write!(
                f,
                "Unsupported file '{}': PDF, JPG, JPEG and PNG are supported",
                name
            ),
            Self::SessionExpired => write!(f, "Your session has expired, please log in again"),
            Self::ServerRejected(detail) => write!(f, "{}", detail),
            Self::NetworkError => write!(f, "Upload failed, please try again"),
        }
    }
}

/// Terminal result of an upload task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    Succeeded,
    Failed { reason: UploadFailure },
}

impl UploadOutcome {
    pub fn failed(reason: UploadFailure) -> Self {
        Self::Failed { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// One observable step of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Percentage of bytes sent, 0..=100, non-decreasing per task.
    Progress(u8),
    /// The task reached a terminal state; no further events follow.
    Finished(UploadOutcome),
}

/// Lifecycle state of an upload task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Uploading,
    Succeeded,
    Failed { reason: UploadFailure },
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

impl From<UploadOutcome> for UploadState {
    fn from(outcome: UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Succeeded => Self::Succeeded,
            UploadOutcome::Failed { reason } => Self::Failed { reason },
        }
    }
}

/// Snapshot of the orchestrator's current task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTask {
    pub id: u64,
    pub file_name: String,
    pub size: u64,
    pub progress_percent: u8,
    pub state: UploadState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(InvoiceFormat::from_file_name("a.PDF"), Some(InvoiceFormat::Pdf));
        assert_eq!(
            InvoiceFormat::from_file_name("scan.final.jpeg"),
            Some(InvoiceFormat::Jpeg)
        );
        assert_eq!(InvoiceFormat::from_file_name("r.png"), Some(InvoiceFormat::Png));
        assert_eq!(InvoiceFormat::from_file_name("notes.txt"), None);
        assert_eq!(InvoiceFormat::from_file_name("no_extension"), None);
    }

    #[test]
    fn test_mime_type_fallback() {
        let file = UploadFile::new("r.png", vec![1, 2, 3]);
        assert_eq!(file.mime_type(), Some("image/png"));
        assert_eq!(file.size(), 3);

        let explicit = file.with_content_type("image/x-png");
        assert_eq!(explicit.mime_type(), Some("image/x-png"));
    }

    #[test]
    fn test_failure_serialization() {
        let json = serde_json::to_string(&UploadFailure::ServerRejected("too big".into())).unwrap();
        assert_eq!(json, r#"{"kind":"server_rejected","detail":"too big"}"#);
    }
}
