//! Report sink: CSV output files and terminal preview tables.
//!
//! Column labels match the source data vocabulary (FUND NAME, DATETIME,
//! PRICE_ref, ...) so the reports line up with the holding files they were
//! derived from. An empty report is refused rather than written.

use anyhow::{Context, Result};
use csv::Writer;
use rust_decimal::Decimal;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::db::models::{ReconciledRow, ReturnRow};
use crate::error::ReportError;

pub const RECONCILIATION_REPORT_FILE: &str = "price_reconciliation_report.csv";
pub const PERFORMANCE_REPORT_FILE: &str = "fund_performance_report.csv";

fn blank_if_none(value: &Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// Price diffs round to 2 decimals; keep the two places in the output even
// for whole-number diffs.
fn diff_cell(value: &Option<Decimal>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn ensure_parent_dir(output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {:?}", parent))?;
    }
    Ok(())
}

/// Write the price reconciliation report.
pub fn write_reconciliation_csv(rows: &[ReconciledRow], output_path: &Path) -> Result<()> {
    if rows.is_empty() {
        return Err(ReportError::EmptyData(
            "price reconciliation report has no rows; nothing to export".to_string(),
        )
        .into());
    }
    ensure_parent_dir(output_path)?;

    let mut writer = Writer::from_path(output_path)
        .with_context(|| format!("Failed to create report file {:?}", output_path))?;
    writer.write_record([
        "FUND NAME",
        "DATETIME",
        "FINANCIAL TYPE",
        "SYMBOL",
        "ISIN",
        "PRICE",
        "PRICE_ref",
        "price_diff",
    ])?;
    for row in rows {
        writer.write_record([
            row.fund_name.clone(),
            row.as_of_date.to_string(),
            row.asset_class.as_str().to_string(),
            row.symbol.clone().unwrap_or_default(),
            row.isin.clone().unwrap_or_default(),
            row.price.to_string(),
            blank_if_none(&row.reference_price),
            diff_cell(&row.price_diff),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the fund performance report (one winning fund per month).
pub fn write_performance_csv(rows: &[ReturnRow], output_path: &Path) -> Result<()> {
    if rows.is_empty() {
        return Err(ReportError::EmptyData(
            "fund performance report has no rows; nothing to export".to_string(),
        )
        .into());
    }
    ensure_parent_dir(output_path)?;

    let mut writer = Writer::from_path(output_path)
        .with_context(|| format!("Failed to create report file {:?}", output_path))?;
    writer.write_record([
        "FUND NAME",
        "month",
        "MV_end",
        "MV_start",
        "realized_pnl",
        "rate_of_return",
    ])?;
    for row in rows {
        writer.write_record([
            row.fund_name.clone(),
            row.month.to_string(),
            row.mv_end.to_string(),
            row.mv_start.to_string(),
            row.realized_pnl.to_string(),
            blank_if_none(&row.rate_of_return),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Tabled)]
struct ReconciliationPreview {
    #[tabled(rename = "Fund")]
    fund: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Type")]
    asset_class: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Ref")]
    reference: String,
    #[tabled(rename = "Diff")]
    diff: String,
}

/// Print the first `limit` reconciled rows as a terminal table.
pub fn print_reconciliation_preview(rows: &[ReconciledRow], limit: usize) {
    let preview: Vec<ReconciliationPreview> = rows
        .iter()
        .take(limit)
        .map(|row| ReconciliationPreview {
            fund: row.fund_name.clone(),
            date: row.as_of_date.to_string(),
            asset_class: row.asset_class.as_str().to_string(),
            key: row
                .symbol
                .clone()
                .or_else(|| row.isin.clone())
                .unwrap_or_default(),
            price: row.price.to_string(),
            reference: blank_if_none(&row.reference_price),
            diff: diff_cell(&row.price_diff),
        })
        .collect();

    let table = Table::new(preview).with(Style::rounded()).to_string();
    println!("{}", table);
    if rows.len() > limit {
        println!("... and {} more rows", rows.len() - limit);
    }
}

#[derive(Tabled)]
struct PerformancePreview {
    #[tabled(rename = "Month")]
    month: String,
    #[tabled(rename = "Fund")]
    fund: String,
    #[tabled(rename = "MV end")]
    mv_end: String,
    #[tabled(rename = "MV start")]
    mv_start: String,
    #[tabled(rename = "Realized P&L")]
    realized_pnl: String,
    #[tabled(rename = "Return")]
    rate_of_return: String,
}

/// Print the monthly winners as a terminal table.
pub fn print_performance_preview(rows: &[ReturnRow]) {
    let preview: Vec<PerformancePreview> = rows
        .iter()
        .map(|row| PerformancePreview {
            month: row.month.to_string(),
            fund: row.fund_name.clone(),
            mv_end: row.mv_end.to_string(),
            mv_start: row.mv_start.to_string(),
            realized_pnl: row.realized_pnl.to_string(),
            rate_of_return: blank_if_none(&row.rate_of_return),
        })
        .collect();

    let table = Table::new(preview).with(Style::rounded()).to_string();
    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AssetClass, Month};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn reconciled_row() -> ReconciledRow {
        ReconciledRow {
            fund_name: "Whitestone".to_string(),
            as_of_date: NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            asset_class: AssetClass::Equity,
            symbol: Some("AAPL".to_string()),
            isin: None,
            price: dec!(150),
            market_value: dec!(100000),
            realized_pl: dec!(5000),
            reference_price: Some(dec!(148)),
            price_diff: Some(dec!(2.00)),
        }
    }

    #[test]
    fn test_reconciliation_csv_has_expected_columns_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join(RECONCILIATION_REPORT_FILE);

        write_reconciliation_csv(&[reconciled_row()], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "FUND NAME,DATETIME,FINANCIAL TYPE,SYMBOL,ISIN,PRICE,PRICE_ref,price_diff"
        );
        assert_eq!(
            lines.next().unwrap(),
            "Whitestone,2023-12-01,Equities,AAPL,,150,148,2.00"
        );
    }

    #[test]
    fn test_unmatched_row_exports_blank_reference_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RECONCILIATION_REPORT_FILE);

        let mut row = reconciled_row();
        row.reference_price = None;
        row.price_diff = None;
        write_reconciliation_csv(&[row], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().nth(1).unwrap().ends_with(",150,,"));
    }

    #[test]
    fn test_performance_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PERFORMANCE_REPORT_FILE);

        let row = ReturnRow {
            fund_name: "FundA".to_string(),
            month: Month {
                year: 2023,
                month: 2,
            },
            mv_end: dec!(110),
            mv_start: dec!(100),
            realized_pnl: dec!(15),
            rate_of_return: Some(dec!(0.25)),
        };
        write_performance_csv(&[row], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "FUND NAME,month,MV_end,MV_start,realized_pnl,rate_of_return"
        );
        assert_eq!(lines.next().unwrap(), "FundA,2023-02,110,100,15,0.25");
    }

    #[test]
    fn test_empty_report_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PERFORMANCE_REPORT_FILE);

        let err = write_performance_csv(&[], &path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::EmptyData(_))
        ));
        assert!(!path.exists());
    }
}
