// Core modules
pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod groups;
pub mod indicators;
pub mod market;
pub mod models;
pub mod persistence;
pub mod provider;
pub mod ranking;
pub mod synthetic;

// Re-export commonly used types
pub use error::AnalysisError;
pub use market::{Market, MarketCalendar};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, AnalysisError>;
