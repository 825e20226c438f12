//! Price reconciliation: as-of matching of holdings against reference quotes.
//!
//! Each holding is paired with the most recent reference price dated at or
//! before the holding's own date, per asset class: equities match on symbol
//! against the equity quote table, bonds match on ISIN against the bond
//! quote table. A holding with no eligible quote keeps a null reference
//! price; that is a valid terminal state, not an error.

use anyhow::Context;
use chrono::NaiveDate;
use itertools::Itertools;
use rayon::prelude::*;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::db;
use crate::db::models::{AssetClass, HoldingRecord, PriceQuote, ReconciledRow};
use crate::error::Result;
use crate::reports::{export, ReportGenerator};

/// Reconcile all holdings against the reference quote tables.
///
/// Output contains one row per holding: equity rows first, then bond rows,
/// each group ordered by distinct holding date (first-seen order) and by
/// input row order within a date.
pub fn reconcile_prices(
    holdings: &[HoldingRecord],
    equity_quotes: &[PriceQuote],
    bond_quotes: &[PriceQuote],
) -> Vec<ReconciledRow> {
    let equities: Vec<&HoldingRecord> = holdings
        .iter()
        .filter(|h| h.asset_class == AssetClass::Equity)
        .collect();
    let bonds: Vec<&HoldingRecord> = holdings
        .iter()
        .filter(|h| h.asset_class == AssetClass::Bond)
        .collect();

    // The two asset-class pipelines share no state and run concurrently
    let (mut rows, bond_rows) = rayon::join(
        || reconcile_asset_class(&equities, equity_quotes),
        || reconcile_asset_class(&bonds, bond_quotes),
    );
    rows.extend(bond_rows);
    rows
}

fn reconcile_asset_class(
    holdings: &[&HoldingRecord],
    quotes: &[PriceQuote],
) -> Vec<ReconciledRow> {
    // The latest-quote table is a function of the query date, so the
    // filter-sort-dedupe chain repeats once per distinct holding date.
    // Dates are independent of each other and are processed in parallel;
    // collecting into a Vec of groups keeps the date order deterministic.
    let dates: Vec<NaiveDate> = holdings.iter().map(|h| h.as_of_date).unique().collect();

    let groups: Vec<Vec<ReconciledRow>> = dates
        .par_iter()
        .map(|&date| {
            let latest = latest_quotes_at(quotes, date);
            holdings
                .iter()
                .filter(|h| h.as_of_date == date)
                .map(|h| reconcile_holding(h, &latest))
                .collect()
        })
        .collect();

    groups.into_iter().flatten().collect()
}

/// Most recent quote per key at or before `as_of`.
///
/// Quotes dated after `as_of` never participate. The sort is stable, so a
/// tie on identical (key, date) pairs resolves to quote input order.
fn latest_quotes_at(quotes: &[PriceQuote], as_of: NaiveDate) -> HashMap<String, Decimal> {
    let mut eligible: Vec<&PriceQuote> =
        quotes.iter().filter(|q| q.as_of_date <= as_of).collect();
    eligible.sort_by(|a, b| a.key.cmp(&b.key).then(b.as_of_date.cmp(&a.as_of_date)));

    let mut latest = HashMap::new();
    for quote in eligible {
        latest.entry(quote.key.clone()).or_insert(quote.price);
    }
    latest
}

fn reconcile_holding(
    holding: &HoldingRecord,
    latest: &HashMap<String, Decimal>,
) -> ReconciledRow {
    let reference_price = holding
        .matching_key()
        .and_then(|key| latest.get(key).copied());
    ReconciledRow {
        fund_name: holding.fund_name.clone(),
        as_of_date: holding.as_of_date,
        asset_class: holding.asset_class,
        symbol: holding.symbol.clone(),
        isin: holding.isin.clone(),
        price: holding.price,
        market_value: holding.market_value,
        realized_pl: holding.realized_pl,
        reference_price,
        price_diff: reference_price.map(|reference| (holding.price - reference).round_dp(2)),
    }
}

/// Price reconciliation report generator
#[derive(Debug, Default)]
pub struct PriceReconciler {
    holdings: Vec<HoldingRecord>,
    equity_quotes: Vec<PriceQuote>,
    bond_quotes: Vec<PriceQuote>,
}

impl PriceReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(&self) -> Vec<ReconciledRow> {
        reconcile_prices(&self.holdings, &self.equity_quotes, &self.bond_quotes)
    }
}

impl ReportGenerator for PriceReconciler {
    fn name(&self) -> &'static str {
        "price reconciliation"
    }

    fn load_and_prepare(&mut self, conn: &Connection) -> Result<()> {
        self.holdings = db::load_holdings(conn).context("Failed to load fund positions")?;
        self.equity_quotes =
            db::load_equity_quotes(conn).context("Failed to load equity prices")?;
        self.bond_quotes = db::load_bond_quotes(conn).context("Failed to load bond prices")?;
        debug!(
            "Prepared {} holdings, {} equity quotes, {} bond quotes",
            self.holdings.len(),
            self.equity_quotes.len(),
            self.bond_quotes.len()
        );
        Ok(())
    }

    fn generate(&self, reports_dir: &Path) -> Result<PathBuf> {
        let rows = self.reconcile();
        let output_path = reports_dir.join(export::RECONCILIATION_REPORT_FILE);
        export::write_reconciliation_csv(&rows, &output_path)?;
        info!("Price reconciliation report saved to {:?}", output_path);
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn equity_holding(fund: &str, symbol: &str, as_of: NaiveDate, price: Decimal) -> HoldingRecord {
        HoldingRecord {
            as_of_date: as_of,
            fund_name: fund.to_string(),
            asset_class: AssetClass::Equity,
            symbol: Some(symbol.to_string()),
            isin: None,
            price,
            market_value: dec!(100000),
            realized_pl: dec!(0),
        }
    }

    fn bond_holding(fund: &str, isin: &str, as_of: NaiveDate, price: Decimal) -> HoldingRecord {
        HoldingRecord {
            as_of_date: as_of,
            fund_name: fund.to_string(),
            asset_class: AssetClass::Bond,
            symbol: Some(isin.to_string()),
            isin: Some(isin.to_string()),
            price,
            market_value: dec!(50000),
            realized_pl: dec!(0),
        }
    }

    fn quote(key: &str, as_of: NaiveDate, price: Decimal) -> PriceQuote {
        PriceQuote {
            as_of_date: as_of,
            key: key.to_string(),
            price,
        }
    }

    #[test]
    fn test_as_of_match_picks_latest_quote_not_after_holding_date() {
        // Bond dated 2023-12-01 against quotes at 11-15 and 11-30: the
        // 11-30 quote (148) wins and the diff is 101 - 148 = -47.00
        let holdings = vec![bond_holding("Gohen", "ISIN123", date(2023, 12, 1), dec!(101))];
        let bond_quotes = vec![
            quote("ISIN123", date(2023, 11, 15), dec!(147)),
            quote("ISIN123", date(2023, 11, 30), dec!(148)),
        ];

        let rows = reconcile_prices(&holdings, &[], &bond_quotes);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reference_price, Some(dec!(148)));
        assert_eq!(rows[0].price_diff, Some(dec!(-47.00)));
    }

    #[test]
    fn test_no_future_leakage() {
        let holdings = vec![equity_holding(
            "Whitestone",
            "AAPL",
            date(2023, 11, 1),
            dec!(150),
        )];
        let equity_quotes = vec![quote("AAPL", date(2023, 11, 2), dec!(148))];

        let rows = reconcile_prices(&holdings, &equity_quotes, &[]);
        assert_eq!(rows[0].reference_price, None);
        assert_eq!(rows[0].price_diff, None);
    }

    #[test]
    fn test_quote_on_same_date_is_eligible() {
        let holdings = vec![equity_holding(
            "Whitestone",
            "AAPL",
            date(2023, 11, 30),
            dec!(150),
        )];
        let equity_quotes = vec![quote("AAPL", date(2023, 11, 30), dec!(148))];

        let rows = reconcile_prices(&holdings, &equity_quotes, &[]);
        assert_eq!(rows[0].reference_price, Some(dec!(148)));
        assert_eq!(rows[0].price_diff, Some(dec!(2.00)));
    }

    #[test]
    fn test_missing_quote_yields_null_not_error() {
        let holdings = vec![equity_holding(
            "Whitestone",
            "MSFT",
            date(2023, 12, 1),
            dec!(370),
        )];
        let equity_quotes = vec![quote("AAPL", date(2023, 11, 30), dec!(148))];

        let rows = reconcile_prices(&holdings, &equity_quotes, &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reference_price, None);
        assert_eq!(rows[0].price_diff, None);
    }

    #[test]
    fn test_duplicate_quotes_on_same_date_resolve_to_input_order() {
        let holdings = vec![equity_holding(
            "Whitestone",
            "AAPL",
            date(2023, 12, 1),
            dec!(150),
        )];
        let equity_quotes = vec![
            quote("AAPL", date(2023, 11, 30), dec!(148)),
            quote("AAPL", date(2023, 11, 30), dec!(149)),
        ];

        let rows = reconcile_prices(&holdings, &equity_quotes, &[]);
        // Stable sort keeps the first-seen quote for the tied (key, date)
        assert_eq!(rows[0].reference_price, Some(dec!(148)));
    }

    #[test]
    fn test_per_date_matching_does_not_leak_across_dates() {
        // Two holdings of the same symbol on different dates: each must see
        // only the quotes eligible for its own date.
        let holdings = vec![
            equity_holding("Whitestone", "AAPL", date(2023, 11, 20), dec!(150)),
            equity_holding("Whitestone", "AAPL", date(2023, 12, 20), dec!(155)),
        ];
        let equity_quotes = vec![
            quote("AAPL", date(2023, 11, 15), dec!(147)),
            quote("AAPL", date(2023, 12, 15), dec!(152)),
        ];

        let rows = reconcile_prices(&holdings, &equity_quotes, &[]);
        assert_eq!(rows[0].reference_price, Some(dec!(147)));
        assert_eq!(rows[1].reference_price, Some(dec!(152)));
    }

    #[test]
    fn test_bonds_follow_equities_in_output() {
        let holdings = vec![
            bond_holding("Gohen", "ISIN123", date(2023, 12, 1), dec!(101)),
            equity_holding("Whitestone", "AAPL", date(2023, 12, 1), dec!(150)),
        ];
        let rows = reconcile_prices(&holdings, &[], &[]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].asset_class, AssetClass::Equity);
        assert_eq!(rows[1].asset_class, AssetClass::Bond);
    }

    #[test]
    fn test_bond_matches_on_isin_against_bond_table_only() {
        let holdings = vec![bond_holding("Gohen", "ISIN123", date(2023, 12, 1), dec!(101))];
        // Same key exists in the equity table but must not be consulted
        let equity_quotes = vec![quote("ISIN123", date(2023, 11, 30), dec!(999))];
        let bond_quotes = vec![quote("ISIN123", date(2023, 11, 30), dec!(148))];

        let rows = reconcile_prices(&holdings, &equity_quotes, &bond_quotes);
        assert_eq!(rows[0].reference_price, Some(dec!(148)));
    }

    #[test]
    fn test_price_diff_rounding_to_two_decimals() {
        let holdings = vec![equity_holding(
            "Whitestone",
            "AAPL",
            date(2023, 12, 1),
            dec!(150.005),
        )];
        let equity_quotes = vec![quote("AAPL", date(2023, 11, 30), dec!(148.001))];

        let rows = reconcile_prices(&holdings, &equity_quotes, &[]);
        assert_eq!(rows[0].price_diff, Some(dec!(2.00)));
    }

    #[test]
    fn test_reconcile_is_deterministic_across_runs() {
        let holdings = vec![
            equity_holding("Whitestone", "AAPL", date(2023, 11, 20), dec!(150)),
            equity_holding("Wallington", "MSFT", date(2023, 11, 20), dec!(370)),
            bond_holding("Gohen", "ISIN123", date(2023, 12, 1), dec!(101)),
            bond_holding("Applebead", "ISIN456", date(2023, 12, 1), dec!(99)),
        ];
        let equity_quotes = vec![
            quote("AAPL", date(2023, 11, 15), dec!(147)),
            quote("MSFT", date(2023, 11, 15), dec!(365)),
        ];
        let bond_quotes = vec![quote("ISIN123", date(2023, 11, 30), dec!(148))];

        let first = reconcile_prices(&holdings, &equity_quotes, &bond_quotes);
        let second = reconcile_prices(&holdings, &equity_quotes, &bond_quotes);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_holdings_produce_empty_report() {
        let rows = reconcile_prices(&[], &[quote("AAPL", date(2023, 11, 30), dec!(148))], &[]);
        assert!(rows.is_empty());
    }
}
