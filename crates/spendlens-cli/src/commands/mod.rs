pub mod analyze;
pub mod auth;
pub mod config;
pub mod invite;
pub mod profile;
pub mod upload;
