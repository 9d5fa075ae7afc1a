// Market codes and session boundaries

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::CalendarConfig;
use crate::error::AnalysisError;
use crate::Result;

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "IN")]
    India,
    #[serde(rename = "US")]
    Us,
}

impl Market {
    /// Parse a market code, falling back to India for anything unknown
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "US" => Market::Us,
            _ => Market::India,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Market::India => "IN",
            Market::Us => "US",
        }
    }

    /// Suffix appended to a ticker for the data provider
    pub fn suffix(&self) -> &'static str {
        match self {
            Market::India => ".NS",
            Market::Us => "",
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            Market::India => "₹",
            Market::Us => "$",
        }
    }

    /// Broad index used as the market-direction proxy
    pub fn index_symbol(&self) -> &'static str {
        match self {
            Market::India => "^NSEI",
            Market::Us => "^GSPC",
        }
    }

    pub fn index_name(&self) -> &'static str {
        match self {
            Market::India => "Nifty 50",
            Market::Us => "S&P 500",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Market::India => "India (NSE)",
            Market::Us => "US",
        }
    }

    /// Ticker as the provider knows it. Index symbols (`^...`) are left alone.
    pub fn provider_symbol(&self, symbol: &str) -> String {
        let symbol = symbol.trim().to_ascii_uppercase();
        if symbol.starts_with('^') || (!self.suffix().is_empty() && symbol.ends_with(self.suffix())) {
            symbol
        } else {
            format!("{}{}", symbol, self.suffix())
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Resolves the most recent session boundary per market.
///
/// Each market has one daily cutoff in a reference timezone. Data fetched
/// before the latest cutoff is stale.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    timezone: Tz,
    cutoffs: HashMap<String, NaiveTime>,
    default_market: String,
}

impl MarketCalendar {
    pub fn new(timezone: Tz, cutoffs: HashMap<String, NaiveTime>, default_market: &str) -> Result<Self> {
        let cutoffs: HashMap<String, NaiveTime> = cutoffs
            .into_iter()
            .map(|(market, time)| (market.to_ascii_uppercase(), time))
            .collect();
        let default_market = default_market.to_ascii_uppercase();

        if !cutoffs.contains_key(&default_market) {
            return Err(AnalysisError::InvalidInput(format!(
                "no cutoff configured for default market {}",
                default_market
            )));
        }

        Ok(Self {
            timezone,
            cutoffs,
            default_market,
        })
    }

    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        let timezone: Tz = config.timezone.parse().map_err(|e| {
            AnalysisError::InvalidInput(format!("invalid timezone {}: {}", config.timezone, e))
        })?;

        let cutoffs = config
            .cutoffs
            .iter()
            .map(|(market, cutoff)| {
                NaiveTime::parse_from_str(cutoff, "%H:%M")
                    .map(|time| (market.clone(), time))
                    .map_err(|e| {
                        AnalysisError::InvalidInput(format!(
                            "invalid cutoff {} for {}: {}",
                            cutoff, market, e
                        ))
                    })
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Self::new(timezone, cutoffs, &config.default_market)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Cutoff for `market`, or the default market's for unknown codes
    pub fn cutoff(&self, market: &str) -> NaiveTime {
        self.cutoffs
            .get(&market.to_ascii_uppercase())
            .or_else(|| self.cutoffs.get(&self.default_market))
            .copied()
            .unwrap_or(NaiveTime::MIN)
    }

    /// Latest boundary at or before `now`
    pub fn session_boundary(&self, market: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = now.with_timezone(&self.timezone).date_naive();
        let candidate = self.localize(local_date.and_time(self.cutoff(market)));

        if now >= candidate {
            candidate
        } else {
            candidate - Duration::days(1)
        }
    }

    /// Reference-zone calendar date of the latest boundary
    pub fn session_date(&self, market: &str, now: DateTime<Utc>) -> NaiveDate {
        self.session_boundary(market, now)
            .with_timezone(&self.timezone)
            .date_naive()
    }

    fn localize(&self, local: chrono::NaiveDateTime) -> DateTime<Utc> {
        // A cutoff inside a DST gap is read as UTC wall time
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local))
    }
}

impl Default for MarketCalendar {
    fn default() -> Self {
        let cutoffs = HashMap::from([
            ("IN".to_string(), NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN)),
            ("US".to_string(), NaiveTime::from_hms_opt(5, 0, 0).unwrap_or(NaiveTime::MIN)),
        ]);
        Self {
            timezone: chrono_tz::Asia::Kolkata,
            cutoffs,
            default_market: "IN".to_string(),
        }
    }
}
