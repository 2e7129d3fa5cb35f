use anyhow::{Context, Result};
use spendlens_infrastructure::{ConfigService, SpendLensPaths};

pub fn init(paths: &SpendLensPaths) -> Result<()> {
    let path = ConfigService::new(paths.clone())
        .ensure_config_file()
        .context("Failed to create config file")?;
    println!("Config file: {}", path.display());
    Ok(())
}

pub fn show(paths: &SpendLensPaths) -> Result<()> {
    let config = ConfigService::new(paths.clone()).get_config();
    let file = paths.config_file().context("Failed to resolve config directory")?;

    println!("Config file:     {}", file.display());
    println!("API base URL:    {}", config.base_url());
    println!("Request timeout: {}s", config.request_timeout_secs);
    println!("Upload timeout:  {}s", config.upload_timeout_secs);
    Ok(())
}
