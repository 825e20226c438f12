// Database module - SQLite connection and table persistence

pub mod models;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub use models::{
    AssetClass, HoldingRecord, Month, MonthlyAggregate, PriceQuote, ReconciledRow, ReturnRow,
};

/// Open a database connection. An in-memory database is used when no path
/// is given, matching the pipeline's default single-run usage.
pub fn open_db(db_path: Option<&Path>) -> Result<Connection> {
    let conn = match db_path {
        Some(path) => Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?,
        None => Connection::open_in_memory().context("Failed to open in-memory database")?,
    };
    Ok(conn)
}

/// Create the fund_positions, equity_prices and bond_prices tables.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;
    info!("Database schema initialized");
    Ok(())
}

/// Execute an operator-provided SQL file, typically the master reference
/// seed that populates the equity_prices and bond_prices tables.
pub fn run_sql_file(conn: &Connection, sql_path: &Path) -> Result<()> {
    let sql = std::fs::read_to_string(sql_path)
        .with_context(|| format!("Failed to read SQL file {:?}", sql_path))?;
    conn.execute_batch(&sql)
        .with_context(|| format!("Failed to execute SQL from {:?}", sql_path))?;
    info!("Executed SQL file {:?}", sql_path);
    Ok(())
}

/// Insert holdings into fund_positions in one transaction, preserving
/// input order (load order is the tie-break order downstream).
pub fn insert_holdings(conn: &mut Connection, holdings: &[HoldingRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO fund_positions (
                fund_name, as_of_date, asset_class, symbol, isin,
                price, market_value, realized_pl
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for holding in holdings {
            stmt.execute(params![
                holding.fund_name,
                holding.as_of_date,
                holding.asset_class.as_str(),
                holding.symbol,
                holding.isin,
                holding.price.to_string(),
                holding.market_value.to_string(),
                holding.realized_pl.to_string(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(holdings.len())
}

/// Load all holdings in insertion order.
pub fn load_holdings(conn: &Connection) -> Result<Vec<HoldingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT fund_name, as_of_date, asset_class, symbol, isin,
                price, market_value, realized_pl
         FROM fund_positions
         ORDER BY id",
    )?;

    let raw_rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, NaiveDate>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read fund_positions rows")?;

    let mut holdings = Vec::with_capacity(raw_rows.len());
    for (fund_name, as_of_date, asset_class, symbol, isin, price, market_value, realized_pl) in
        raw_rows
    {
        holdings.push(HoldingRecord {
            as_of_date,
            asset_class: AssetClass::from_str(&asset_class)
                .map_err(|_| anyhow!("Unknown asset class '{}' in fund_positions", asset_class))?,
            fund_name,
            symbol,
            isin,
            price: parse_decimal(&price, "fund_positions.price")?,
            market_value: parse_decimal(&market_value, "fund_positions.market_value")?,
            realized_pl: parse_decimal(&realized_pl, "fund_positions.realized_pl")?,
        });
    }
    Ok(holdings)
}

pub fn load_equity_quotes(conn: &Connection) -> Result<Vec<PriceQuote>> {
    load_quotes(conn, "equity_prices", "symbol")
}

pub fn load_bond_quotes(conn: &Connection) -> Result<Vec<PriceQuote>> {
    load_quotes(conn, "bond_prices", "isin")
}

fn load_quotes(conn: &Connection, table: &str, key_column: &str) -> Result<Vec<PriceQuote>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {key}, as_of_date, price FROM {table} ORDER BY id",
        key = key_column,
        table = table,
    ))?;

    let raw_rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, NaiveDate>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read {} rows", table))?;

    let mut quotes = Vec::with_capacity(raw_rows.len());
    for (key, as_of_date, price) in raw_rows {
        quotes.push(PriceQuote {
            as_of_date,
            key,
            price: parse_decimal(&price, table)?,
        });
    }
    Ok(quotes)
}

fn parse_decimal(raw: &str, what: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("Invalid decimal '{}' in {}", raw, what))
}
