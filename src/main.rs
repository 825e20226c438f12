use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use fundrecon::cli::{Cli, Commands};
use fundrecon::config::Config;
use fundrecon::pipeline::FundPipeline;
use fundrecon::reports::export;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data.funds_dir = dir;
    }
    if let Some(path) = cli.reference_sql {
        config.data.reference_sql = Some(path);
    }
    if let Some(dir) = cli.reports_dir {
        config.reports.output_dir = dir;
    }

    match cli.command {
        Commands::Run => {
            let mut pipeline = FundPipeline::new(config)?;
            let written = pipeline.run()?;
            println!("\n{} Pipeline complete", "✓".green().bold());
            for path in written {
                println!("  {}", path.display());
            }
            Ok(())
        }

        Commands::Reconcile { dry_run } => {
            let mut pipeline = FundPipeline::new(config)?;
            pipeline.prepare()?;
            let rows = pipeline.reconciliation_rows()?;

            println!(
                "\n{} Reconciled {} holdings\n",
                "✓".green().bold(),
                rows.len()
            );
            export::print_reconciliation_preview(&rows, 10);

            if dry_run {
                println!("\n{} Dry run - report not written", "ℹ".blue().bold());
                return Ok(());
            }
            let path = pipeline.write_reconciliation_report(&rows)?;
            println!("\n{} Report saved to {}", "✓".green().bold(), path.display());
            Ok(())
        }

        Commands::Performance { dry_run } => {
            let mut pipeline = FundPipeline::new(config)?;
            pipeline.prepare()?;
            let rows = pipeline.performance_rows()?;

            println!(
                "\n{} Computed top performers for {} months\n",
                "✓".green().bold(),
                rows.len()
            );
            export::print_performance_preview(&rows);

            if dry_run {
                println!("\n{} Dry run - report not written", "ℹ".blue().bold());
                return Ok(());
            }
            let path = pipeline.write_performance_report(&rows)?;
            println!("\n{} Report saved to {}", "✓".green().bold(), path.display());
            Ok(())
        }
    }
}
