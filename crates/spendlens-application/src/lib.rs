//! Application layer for SpendLens.
//!
//! Use cases composed from the core domain and wired to the infrastructure
//! adapters.

pub mod account_service;
pub mod analysis_service;
pub mod auth_usecase;
pub mod context;
pub mod error;

pub use account_service::AccountService;
pub use analysis_service::AnalysisService;
pub use auth_usecase::AuthUseCase;
pub use context::ClientContext;
pub use error::AuthError;
