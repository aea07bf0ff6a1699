//! Shared foundations for the Docent crates: the [`AppError`] taxonomy and
//! its exit codes, layered [`AppConfig`] loading, and tracing setup.

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
