//! Loading invoice files from disk.

use spendlens_core::error::{Result, SpendError};
use spendlens_core::upload::UploadFile;
use std::path::Path;

/// Reads `path` into an [`UploadFile`] named after its file name, with the
/// content type guessed from the extension.
///
/// Format acceptance is left to the upload orchestrator, so unsupported files
/// load fine and fail there with a proper reason.
///
/// # Errors
///
/// `SpendError::Io` if the file cannot be read, or the path has no file name.
pub async fn load_invoice(path: &Path) -> Result<UploadFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| SpendError::io(format!("Not a file path: {}", path.display())))?;

    let bytes = tokio::fs::read(path).await?;
    let mut file = UploadFile::new(name, bytes);
    if let Some(mime) = mime_guess::from_path(path).first() {
        file = file.with_content_type(mime.essence_str());
    }

    tracing::debug!(path = %path.display(), size = file.size(), "Loaded invoice file");
    Ok(file)
}
