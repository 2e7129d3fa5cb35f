use anyhow::{Context, Result, bail};
use spendlens_application::ClientContext;
use spendlens_core::upload::{UploadEvent, UploadOutcome};
use spendlens_infrastructure::load_invoice;
use std::path::Path;

pub async fn run(ctx: &ClientContext, path: &Path) -> Result<()> {
    let file = load_invoice(path)
        .await
        .with_context(|| format!("Failed to read invoice: {}", path.display()))?;
    println!("Uploading {} ({} bytes)", file.name, file.size());

    let mut handle = ctx.uploads.start(file);
    while let Some(event) = handle.next().await {
        match event {
            UploadEvent::Progress(percent) => eprint!("\rProgress: {:>3}%", percent),
            UploadEvent::Finished(UploadOutcome::Succeeded) => {
                eprintln!();
                println!("File uploaded successfully");
                return Ok(());
            }
            UploadEvent::Finished(UploadOutcome::Failed { reason }) => {
                eprintln!();
                bail!("{}", reason);
            }
        }
    }

    bail!("Upload was superseded by another upload")
}
