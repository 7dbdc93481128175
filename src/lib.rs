//! Public API: load a bank operations export, then build the summary,
//! the category report or the round-up savings figure from it.

pub mod config;
pub mod errors;
pub mod loader;
pub mod market;
pub mod models;
pub mod reports;
pub mod services;
pub mod views;

pub use config::{ApiConfig, UserSettings};
pub use models::{Operation, RawAmount};
pub use services::investment_bank;
