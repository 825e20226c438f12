//! End-to-end pipeline: database setup, data load, report generation.
//!
//! The pipeline owns the database connection and wires the loader and the
//! two report generators together. Engines never see the file system or
//! the config; they only receive the tables the pipeline prepared.

use anyhow::Context;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::db::models::{ReconciledRow, ReturnRow};
use crate::error::Result;
use crate::loader;
use crate::reports::{export, PerformanceAnalyzer, PriceReconciler, ReportGenerator};

pub struct FundPipeline {
    config: Config,
    conn: Connection,
}

impl FundPipeline {
    pub fn new(config: Config) -> Result<Self> {
        let conn = db::open_db(config.data.db_path.as_deref())?;
        Ok(Self { config, conn })
    }

    /// Create the schema and run the reference price seed SQL when
    /// configured. A missing seed file downgrades to a warning: the
    /// reconciliation report then simply carries null reference prices.
    pub fn setup_database(&self) -> Result<()> {
        db::init_schema(&self.conn)?;
        match &self.config.data.reference_sql {
            Some(path) if path.exists() => db::run_sql_file(&self.conn, path)?,
            Some(path) => warn!(
                "Reference SQL file {:?} not found; price tables start empty",
                path
            ),
            None => {}
        }
        Ok(())
    }

    /// Load holding files from the configured folder into fund_positions.
    pub fn load_data(&mut self) -> Result<()> {
        let holdings =
            loader::load_fund_positions(&self.config.data.funds_dir, &self.config.funds.names)?;
        if holdings.is_empty() {
            warn!(
                "No valid fund data loaded from {:?}",
                self.config.data.funds_dir
            );
            return Ok(());
        }
        let inserted = db::insert_holdings(&mut self.conn, &holdings)?;
        info!("Loaded {} validated holdings into fund_positions", inserted);
        Ok(())
    }

    /// Convenience for the single-report CLI commands.
    pub fn prepare(&mut self) -> Result<()> {
        self.setup_database()?;
        self.load_data()
    }

    /// Run every report generator against the prepared database.
    pub fn generate_reports(&self) -> Result<Vec<PathBuf>> {
        let mut generators: Vec<Box<dyn ReportGenerator>> = vec![
            Box::new(PriceReconciler::new()),
            Box::new(PerformanceAnalyzer::new()),
        ];

        let mut written = Vec::with_capacity(generators.len());
        for generator in &mut generators {
            generator
                .load_and_prepare(&self.conn)
                .with_context(|| format!("Failed to prepare {} report", generator.name()))?;
            let path = generator
                .generate(&self.config.reports.output_dir)
                .with_context(|| format!("Failed to generate {} report", generator.name()))?;
            written.push(path);
        }
        Ok(written)
    }

    /// The full pipeline: setup, load, generate both reports.
    pub fn run(&mut self) -> Result<Vec<PathBuf>> {
        self.setup_database()?;
        self.load_data()?;
        self.generate_reports()
    }

    /// Compute the reconciliation rows without writing a report file.
    pub fn reconciliation_rows(&self) -> Result<Vec<ReconciledRow>> {
        let mut generator = PriceReconciler::new();
        generator.load_and_prepare(&self.conn)?;
        Ok(generator.reconcile())
    }

    /// Compute the monthly winners without writing a report file.
    pub fn performance_rows(&self) -> Result<Vec<ReturnRow>> {
        let mut generator = PerformanceAnalyzer::new();
        generator.load_and_prepare(&self.conn)?;
        generator.top_performing_funds()
    }

    pub fn write_reconciliation_report(&self, rows: &[ReconciledRow]) -> Result<PathBuf> {
        let path = self
            .config
            .reports
            .output_dir
            .join(export::RECONCILIATION_REPORT_FILE);
        export::write_reconciliation_csv(rows, &path)?;
        Ok(path)
    }

    pub fn write_performance_report(&self, rows: &[ReturnRow]) -> Result<PathBuf> {
        let path = self
            .config
            .reports
            .output_dir
            .join(export::PERFORMANCE_REPORT_FILE);
        export::write_performance_csv(rows, &path)?;
        Ok(path)
    }
}
