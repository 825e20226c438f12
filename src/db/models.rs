use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Asset classes carried by the fund holding files
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Equity,
    Bond, // Government bonds, matched by ISIN
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Equity => "Equities",
            AssetClass::Bond => "Government Bond",
        }
    }
}

impl FromStr for AssetClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EQUITIES" | "EQUITY" => Ok(AssetClass::Equity),
            "GOVERNMENT BOND" | "GOVERNMENT BONDS" | "BOND" | "BONDS" => Ok(AssetClass::Bond),
            _ => Err(()),
        }
    }
}

/// Calendar year-month, the grain of the performance report.
///
/// Ordering follows chronology (year first, then month), so sorted
/// containers keyed by `Month` iterate oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s.trim().split_once('-').ok_or(())?;
        let year: i32 = year.parse().map_err(|_| ())?;
        let month: u32 = month.parse().map_err(|_| ())?;
        if !(1..=12).contains(&month) {
            return Err(());
        }
        Ok(Self { year, month })
    }
}

/// One fund's position in one security on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub as_of_date: NaiveDate,
    pub fund_name: String,
    pub asset_class: AssetClass,
    pub symbol: Option<String>,
    pub isin: Option<String>,
    pub price: Decimal,
    pub market_value: Decimal,
    pub realized_pl: Decimal,
}

impl HoldingRecord {
    /// Matching key for as-of price lookup: symbol for equities, ISIN for
    /// bonds. The loader guarantees bond rows carry an ISIN (copied from
    /// the symbol when the source file left it blank).
    pub fn matching_key(&self) -> Option<&str> {
        match self.asset_class {
            AssetClass::Equity => self.symbol.as_deref(),
            AssetClass::Bond => self.isin.as_deref(),
        }
    }

    pub fn month(&self) -> Month {
        Month::from_date(self.as_of_date)
    }
}

/// One reference price observation. `key` is a symbol for equity quotes
/// and an ISIN for bond quotes. Duplicate (key, date) pairs are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub as_of_date: NaiveDate,
    pub key: String,
    pub price: Decimal,
}

/// One holding paired with its reference price. Both price fields stay
/// `None` when no quote at or before the holding date exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub fund_name: String,
    pub as_of_date: NaiveDate,
    pub asset_class: AssetClass,
    pub symbol: Option<String>,
    pub isin: Option<String>,
    pub price: Decimal,
    pub market_value: Decimal,
    pub realized_pl: Decimal,
    pub reference_price: Option<Decimal>,
    /// `round(price - reference_price, 2)`; null propagates
    pub price_diff: Option<Decimal>,
}

/// Per-fund, per-month sums of market value and realized P&L
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub fund_name: String,
    pub month: Month,
    pub mv_end: Decimal,
    pub realized_pnl: Decimal,
}

/// One fund's return for one month.
///
/// `rate_of_return` is `None` when `mv_start` is zero: the division is
/// undefined and the value flows through to the report for downstream
/// consumers to filter, rather than being raised as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRow {
    pub fund_name: String,
    pub month: Month,
    pub mv_end: Decimal,
    pub mv_start: Decimal,
    pub realized_pnl: Decimal,
    pub rate_of_return: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_asset_class_round_trip() {
        assert_eq!(AssetClass::from_str("Equities"), Ok(AssetClass::Equity));
        assert_eq!(AssetClass::from_str("Government Bond"), Ok(AssetClass::Bond));
        assert_eq!(
            AssetClass::from_str(AssetClass::Equity.as_str()),
            Ok(AssetClass::Equity)
        );
        assert!(AssetClass::from_str("Crypto").is_err());
    }

    #[test]
    fn test_month_ordering_is_chronological() {
        let dec_2022 = Month {
            year: 2022,
            month: 12,
        };
        let jan_2023 = Month {
            year: 2023,
            month: 1,
        };
        let feb_2023 = Month {
            year: 2023,
            month: 2,
        };
        assert!(dec_2022 < jan_2023);
        assert!(jan_2023 < feb_2023);
    }

    #[test]
    fn test_month_display_and_parse() {
        let month = Month::from_date(NaiveDate::from_ymd_opt(2023, 2, 15).unwrap());
        assert_eq!(month.to_string(), "2023-02");
        assert_eq!("2023-02".parse::<Month>(), Ok(month));
        assert!("2023-13".parse::<Month>().is_err());
        assert!("202302".parse::<Month>().is_err());
    }

    #[test]
    fn test_matching_key_per_asset_class() {
        let mut holding = HoldingRecord {
            as_of_date: NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            fund_name: "Whitestone".to_string(),
            asset_class: AssetClass::Equity,
            symbol: Some("AAPL".to_string()),
            isin: Some("US0378331005".to_string()),
            price: dec!(150),
            market_value: dec!(100000),
            realized_pl: dec!(5000),
        };
        assert_eq!(holding.matching_key(), Some("AAPL"));

        holding.asset_class = AssetClass::Bond;
        assert_eq!(holding.matching_key(), Some("US0378331005"));

        holding.isin = None;
        assert_eq!(holding.matching_key(), None);
    }
}
