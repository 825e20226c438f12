//! Fundrecon - fund holdings reconciliation and performance analytics
//!
//! This library reconciles fund holdings against independent reference
//! prices (as-of price matching) and computes monthly rate-of-return
//! performance per fund, reporting the top performer for each month.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod reports;
