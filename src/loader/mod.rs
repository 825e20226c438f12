//! Fund holding file discovery and ingestion.
//!
//! Each holding file is a CSV named after its fund and as-of date
//! (e.g. `Whitestone.2023-12-01.csv`); both are recovered from the file
//! name, since the rows themselves carry neither. Files whose name yields
//! no known fund or no date are skipped with a warning. Bond rows that
//! arrive without an ISIN get it copied from the symbol here, so the
//! reconciliation engine can rely on the ISIN being the bond matching key.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use regex::Regex;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::db::models::{AssetClass, HoldingRecord};
use crate::error::ReportError;

/// List CSV files in a folder, sorted by file name so load order (and the
/// tie-break order it implies downstream) is deterministic.
pub fn list_csv_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder)
        .with_context(|| format!("Failed to read fund data folder {:?}", folder))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Extract the fund name from a file name by matching against the known
/// fund list. Returns None when no known fund appears in the name.
pub fn extract_fund_name(file_name: &str, known_funds: &[String]) -> Option<String> {
    known_funds
        .iter()
        .find(|fund| file_name.contains(fund.as_str()))
        .cloned()
}

/// Extract a date from a file name, trying several layouts in order:
/// `YYYY-MM-DD`, `YYYYMMDD`, `MM-DD-YYYY`, `YYYY-MM` and `YYYYMM`
/// (`_` accepted wherever `-` is). Month-only layouts resolve to the
/// first of the month.
pub fn extract_date_from_file_name(file_name: &str) -> Option<NaiveDate> {
    let ymd = Regex::new(r"(\d{4})[-_](\d{2})[-_](\d{2})").ok()?;
    if let Some(caps) = ymd.captures(file_name) {
        if let Some(date) = ymd_from_captures(&caps, 1, 2, 3) {
            return Some(date);
        }
    }

    // Eight digits with non-digit neighbours: YYYYMMDD
    let compact_ymd = Regex::new(r"(?:^|\D)(\d{4})(\d{2})(\d{2})(?:\D|$)").ok()?;
    if let Some(caps) = compact_ymd.captures(file_name) {
        if let Some(date) = ymd_from_captures(&caps, 1, 2, 3) {
            return Some(date);
        }
    }

    let mdy = Regex::new(r"(\d{2})[-_](\d{2})[-_](\d{4})").ok()?;
    if let Some(caps) = mdy.captures(file_name) {
        // Month-first, falling back to day-first when the month is invalid
        if let Some(date) = ymd_from_captures(&caps, 3, 1, 2) {
            return Some(date);
        }
        if let Some(date) = ymd_from_captures(&caps, 3, 2, 1) {
            return Some(date);
        }
    }

    let ym = Regex::new(r"(\d{4})[-_](\d{2})").ok()?;
    if let Some(caps) = ym.captures(file_name) {
        if let Some(date) = month_start_from_captures(&caps) {
            return Some(date);
        }
    }

    let compact_ym = Regex::new(r"(?:^|\D)(\d{4})(\d{2})(?:\D|$)").ok()?;
    if let Some(caps) = compact_ym.captures(file_name) {
        if let Some(date) = month_start_from_captures(&caps) {
            return Some(date);
        }
    }

    None
}

fn ymd_from_captures(caps: &regex::Captures<'_>, y: usize, m: usize, d: usize) -> Option<NaiveDate> {
    let year: i32 = caps.get(y)?.as_str().parse().ok()?;
    let month: u32 = caps.get(m)?.as_str().parse().ok()?;
    let day: u32 = caps.get(d)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_start_from_captures(caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Discover, parse and enrich every holding file in `folder`.
///
/// Returns the combined holdings across all valid files, with the bond
/// ISIN fix-up already applied.
pub fn load_fund_positions(folder: &Path, known_funds: &[String]) -> Result<Vec<HoldingRecord>> {
    let files = list_csv_files(folder)?;
    info!("Found {} CSV files in {:?}", files.len(), folder);

    let mut holdings = Vec::new();
    for path in files {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let Some(fund_name) = extract_fund_name(stem, known_funds) else {
            warn!("Skipping {:?}: no known fund name in file name", path);
            continue;
        };
        let Some(as_of_date) = extract_date_from_file_name(stem) else {
            warn!("Skipping {:?}: no date in file name", path);
            continue;
        };

        let rows = parse_holdings_csv(&path, &fund_name, as_of_date)?;
        debug!("Parsed {} holdings from {:?}", rows.len(), path);
        holdings.extend(rows);
    }

    // Bond files leave the ISIN column blank and carry the identifier in
    // SYMBOL; copy it over so the engines can match bonds on ISIN.
    for holding in &mut holdings {
        if holding.asset_class == AssetClass::Bond && holding.isin.is_none() {
            holding.isin = holding.symbol.clone();
        }
    }

    info!("Loaded {} validated holdings", holdings.len());
    Ok(holdings)
}

#[derive(Debug)]
struct CsvColumnMapping {
    asset_class: usize,
    price: usize,
    market_value: usize,
    realized_pl: usize,
    symbol: Option<usize>,
    isin: Option<usize>,
}

fn find_columns(headers: &csv::StringRecord, source_name: &str) -> Result<CsvColumnMapping> {
    let position = |wanted: &str| -> Option<usize> {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    };
    let required = |wanted: &str| -> Result<usize> {
        position(wanted).ok_or_else(|| {
            ReportError::SchemaMismatch {
                source_name: source_name.to_string(),
                column: wanted.to_string(),
            }
            .into()
        })
    };

    Ok(CsvColumnMapping {
        asset_class: required("FINANCIAL TYPE")?,
        price: required("PRICE")?,
        market_value: required("MARKET VALUE")?,
        realized_pl: required("REALISED P/L")?,
        symbol: position("SYMBOL"),
        isin: position("ISIN"),
    })
}

fn parse_holdings_csv(
    path: &Path,
    fund_name: &str,
    as_of_date: NaiveDate,
) -> Result<Vec<HoldingRecord>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file {:?}", path))?;

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();
    let source_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("holdings CSV")
        .to_string();
    let columns = find_columns(&headers, &source_name)?;

    let mut holdings = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row in {:?}", path))?;
        match parse_row(&record, &columns, fund_name, as_of_date) {
            Ok(Some(holding)) => holdings.push(holding),
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping row {} of {:?}: {}", idx + 2, path, e);
                continue;
            }
        }
    }
    Ok(holdings)
}

fn parse_row(
    record: &csv::StringRecord,
    columns: &CsvColumnMapping,
    fund_name: &str,
    as_of_date: NaiveDate,
) -> Result<Option<HoldingRecord>> {
    let cell = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();
    let optional_cell = |idx: Option<usize>| -> Option<String> {
        idx.map(cell)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let raw_class = cell(columns.asset_class);
    if raw_class.is_empty() {
        return Ok(None); // blank row
    }
    let asset_class = AssetClass::from_str(raw_class)
        .map_err(|_| anyhow::anyhow!("Unknown financial type '{}'", raw_class))?;

    Ok(Some(HoldingRecord {
        as_of_date,
        fund_name: fund_name.to_string(),
        asset_class,
        symbol: optional_cell(columns.symbol),
        isin: optional_cell(columns.isin),
        price: parse_decimal_cell(cell(columns.price), "PRICE")?,
        market_value: parse_decimal_cell(cell(columns.market_value), "MARKET VALUE")?,
        realized_pl: parse_decimal_cell(cell(columns.realized_pl), "REALISED P/L")?,
    }))
}

fn parse_decimal_cell(raw: &str, column: &str) -> Result<Decimal> {
    let cleaned = raw.replace(',', "");
    Decimal::from_str(&cleaned)
        .with_context(|| format!("Invalid decimal '{}' in column {}", raw, column))
}
