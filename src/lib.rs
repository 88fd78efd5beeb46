// Core modules
pub mod api;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod scanner;
pub mod sentiment;
pub mod strategy;

// Re-export commonly used types
pub use feed::{CandleBuffer, FeedStatus};
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
