pub mod api;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod models;
pub mod payslip;
pub mod prompts;
pub mod providers;

// Re-export commonly used items
pub use config::AppConfig;
pub use error::{PayslipError, Result};
