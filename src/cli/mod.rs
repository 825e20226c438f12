use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fundrecon")]
#[command(
    version,
    about = "Fund holdings reconciliation and monthly performance reports"
)]
#[command(
    long_about = "Reconcile fund holding files against reference prices (as-of price matching) \
and compute each fund's month-over-month rate of return, reporting the top performer per month."
)]
pub struct Cli {
    /// Path to a fundrecon.toml config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the folder scanned for fund holding CSV files
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the SQL file seeding the reference price tables
    #[arg(long, global = true)]
    pub reference_sql: Option<PathBuf>,

    /// Override the report output folder
    #[arg(long, global = true)]
    pub reports_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline: schema setup, data load, both reports
    Run,

    /// Generate only the price reconciliation report
    Reconcile {
        /// Preview rows without writing the report file
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Generate only the fund performance report
    Performance {
        /// Preview rows without writing the report file
        #[arg(short, long)]
        dry_run: bool,
    },
}
