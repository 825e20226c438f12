// Reports module - price reconciliation and fund performance generators

pub mod export;
pub mod performance;
pub mod reconciliation;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use performance::{calculate_monthly_returns, top_performers, PerformanceAnalyzer};
pub use reconciliation::{reconcile_prices, PriceReconciler};

/// Shared contract for report generators: pull inputs from the database,
/// then compute and write the report file.
pub trait ReportGenerator {
    /// Human-readable report name for log and error messages
    fn name(&self) -> &'static str;

    /// Load input tables and apply any preparation they need
    fn load_and_prepare(&mut self, conn: &Connection) -> Result<()>;

    /// Compute the report and write it under `reports_dir`, returning the
    /// path of the written file
    fn generate(&self, reports_dir: &Path) -> Result<PathBuf>;
}
