//! Monthly fund performance: aggregation, lagged returns, top performers.
//!
//! Holdings are summed into per-fund per-month market value and realized
//! P&L, each fund's months are lagged chronologically to obtain the
//! starting market value, and the month-over-month rate of return is
//! `(mv_end - mv_start + realized_pnl) / mv_start`. The report keeps one
//! winning fund per month.

use anyhow::Context;
use rayon::prelude::*;
use rusqlite::Connection;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::db;
use crate::db::models::{HoldingRecord, Month, MonthlyAggregate, ReturnRow};
use crate::error::{ReportError, Result};
use crate::reports::{export, ReportGenerator};

/// Sum market value and realized P&L per (fund, month).
///
/// Output is sorted by fund name, then month, which fixes the tie-break
/// order for everything downstream.
pub fn aggregate_monthly(holdings: &[HoldingRecord]) -> Vec<MonthlyAggregate> {
    let mut grouped: BTreeMap<(String, Month), MonthlyAggregate> = BTreeMap::new();
    for holding in holdings {
        let key = (holding.fund_name.clone(), holding.month());
        match grouped.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(MonthlyAggregate {
                    fund_name: holding.fund_name.clone(),
                    month: holding.month(),
                    mv_end: holding.market_value,
                    realized_pnl: holding.realized_pl,
                });
            }
            Entry::Occupied(mut entry) => {
                let aggregate = entry.get_mut();
                aggregate.mv_end += holding.market_value;
                aggregate.realized_pnl += holding.realized_pl;
            }
        }
    }
    grouped.into_values().collect()
}

/// Compute the month-over-month return rows for every fund.
///
/// The first observed month of each fund has no prior period and is
/// dropped, so a single-month fund contributes zero rows. Fails fast with
/// an empty-data error when no holdings were loaded at all.
pub fn calculate_monthly_returns(holdings: &[HoldingRecord]) -> Result<Vec<ReturnRow>> {
    if holdings.is_empty() {
        return Err(ReportError::EmptyData(
            "fund positions table has no rows; load holdings before computing performance"
                .to_string(),
        )
        .into());
    }

    let mut by_fund: BTreeMap<String, Vec<MonthlyAggregate>> = BTreeMap::new();
    for aggregate in aggregate_monthly(holdings) {
        by_fund
            .entry(aggregate.fund_name.clone())
            .or_default()
            .push(aggregate);
    }

    // Lagging is independent per fund, so funds run in parallel; the final
    // sort restores a deterministic order regardless of the merge order.
    let funds: Vec<Vec<MonthlyAggregate>> = by_fund.into_values().collect();
    let mut rows: Vec<ReturnRow> = funds
        .par_iter()
        .map(|aggregates| lag_and_compute_returns(aggregates))
        .collect::<Vec<Vec<_>>>()
        .into_iter()
        .flatten()
        .collect();
    rows.sort_by(|a, b| a.fund_name.cmp(&b.fund_name).then(a.month.cmp(&b.month)));
    Ok(rows)
}

/// Aggregates arrive chronological within one fund; each consecutive pair
/// yields one return row with `mv_start` taken from the earlier month.
fn lag_and_compute_returns(aggregates: &[MonthlyAggregate]) -> Vec<ReturnRow> {
    aggregates
        .windows(2)
        .map(|pair| {
            let (previous, current) = (&pair[0], &pair[1]);
            let mv_start = previous.mv_end;
            // Zero starting value makes the return undefined; the row still
            // flows through for downstream consumers to filter.
            let rate_of_return = if mv_start.is_zero() {
                None
            } else {
                Some(
                    ((current.mv_end - mv_start + current.realized_pnl) / mv_start).round_dp(4),
                )
            };
            ReturnRow {
                fund_name: current.fund_name.clone(),
                month: current.month,
                mv_end: current.mv_end,
                mv_start,
                realized_pnl: current.realized_pnl,
                rate_of_return,
            }
        })
        .collect()
}

/// Keep the single best-performing fund per month, months ascending.
///
/// Only a strictly greater return displaces the current winner, so ties
/// resolve to the earlier row in the (fund, month) ordering the return
/// computation emits. Undefined returns rank below every finite return.
pub fn top_performers(returns: &[ReturnRow]) -> Vec<ReturnRow> {
    let mut best: BTreeMap<Month, &ReturnRow> = BTreeMap::new();
    for row in returns {
        match best.entry(row.month) {
            Entry::Vacant(entry) => {
                entry.insert(row);
            }
            Entry::Occupied(mut entry) => {
                // Option<Decimal> orders None below every Some
                if row.rate_of_return > entry.get().rate_of_return {
                    entry.insert(row);
                }
            }
        }
    }
    best.into_values().cloned().collect()
}

/// Fund performance report generator
#[derive(Debug, Default)]
pub struct PerformanceAnalyzer {
    holdings: Vec<HoldingRecord>,
}

impl PerformanceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full computation: monthly returns reduced to one winner per month.
    pub fn top_performing_funds(&self) -> Result<Vec<ReturnRow>> {
        let returns = calculate_monthly_returns(&self.holdings)?;
        Ok(top_performers(&returns))
    }
}

impl ReportGenerator for PerformanceAnalyzer {
    fn name(&self) -> &'static str {
        "fund performance"
    }

    fn load_and_prepare(&mut self, conn: &Connection) -> Result<()> {
        self.holdings = db::load_holdings(conn).context("Failed to load fund positions")?;
        debug!("Prepared {} holdings", self.holdings.len());
        Ok(())
    }

    fn generate(&self, reports_dir: &Path) -> Result<PathBuf> {
        let top_funds = self
            .top_performing_funds()
            .context("Error during report generation")?;
        let output_path = reports_dir.join(export::PERFORMANCE_REPORT_FILE);
        export::write_performance_csv(&top_funds, &output_path)?;
        info!("Fund performance report saved to {:?}", output_path);
        Ok(output_path)
    }
}
