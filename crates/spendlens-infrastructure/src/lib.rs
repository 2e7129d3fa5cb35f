pub mod config_service;
pub mod invoice_file;
pub mod paths;
pub mod reqwest_transport;
pub mod storage;
pub mod toml_credential_store;

pub use crate::config_service::ConfigService;
pub use crate::invoice_file::load_invoice;
pub use crate::paths::SpendLensPaths;
pub use crate::reqwest_transport::ReqwestTransport;
pub use crate::toml_credential_store::TomlCredentialStore;
