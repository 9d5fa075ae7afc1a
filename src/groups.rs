//! Built-in stock baskets per market

use serde::Serialize;

use crate::market::Market;

/// A named basket of bare tickers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockGroup {
    pub id: &'static str,
    pub name: &'static str,
    pub market: Market,
    pub symbols: &'static [&'static str],
}

impl StockGroup {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.to_string()).collect()
    }
}

/// Listing entry without the member list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub id: &'static str,
    pub name: &'static str,
    pub count: usize,
}

const NIFTY_50: &[&str] = &[
    "RELIANCE", "TCS", "HDFCBANK", "INFY", "ICICIBANK",
    "HINDUNILVR", "SBIN", "BHARTIARTL", "ITC", "KOTAKBANK",
    "LT", "HCLTECH", "AXISBANK", "ASIANPAINT", "MARUTI",
    "SUNPHARMA", "TITAN", "BAJFINANCE", "ULTRACEMCO", "WIPRO",
    "ONGC", "NTPC", "JSWSTEEL", "POWERGRID", "M&M",
    "TATASTEEL", "ADANIENT", "ADANIPORTS", "COALINDIA", "HINDALCO",
    "GRASIM", "NESTLEIND", "TECHM", "BAJAJFINSV", "BAJAJ-AUTO",
    "INDUSINDBK", "HDFCLIFE", "SBILIFE", "BRITANNIA", "CIPLA",
    "APOLLOHOSP", "DIVISLAB", "DRREDDY", "EICHERMOT", "HEROMOTOCO",
    "TATACONSUM", "BPCL", "SHRIRAMFIN", "TATAMOTORS", "BEL",
];

const SENSEX_30: &[&str] = &[
    "RELIANCE", "TCS", "HDFCBANK", "INFY", "ICICIBANK",
    "HINDUNILVR", "SBIN", "BHARTIARTL", "ITC", "KOTAKBANK",
    "LT", "HCLTECH", "AXISBANK", "ASIANPAINT", "MARUTI",
    "SUNPHARMA", "TITAN", "BAJFINANCE", "ULTRACEMCO", "WIPRO",
    "NTPC", "POWERGRID", "M&M", "TATASTEEL", "ADANIENT",
    "NESTLEIND", "TECHM", "BAJAJFINSV", "INDUSINDBK", "TATAMOTORS",
];

const NASDAQ_100: &[&str] = &[
    "AAPL", "MSFT", "AMZN", "NVDA", "GOOGL",
    "META", "TSLA", "AVGO", "COST", "NFLX",
    "AMD", "ADBE", "PEP", "CSCO", "TMUS",
    "INTC", "INTU", "CMCSA", "TXN", "AMGN",
    "QCOM", "HON", "AMAT", "ISRG", "BKNG",
    "SBUX", "VRTX", "LRCX", "ADI", "MDLZ",
    "GILD", "PANW", "REGN", "MU", "KLAC",
    "SNPS", "CDNS", "MELI", "PYPL", "CRWD",
    "CTAS", "MAR", "MRVL", "ORLY", "ABNB",
    "FTNT", "MNST", "DASH", "WDAY", "KDP",
];

const SP500_TOP_50: &[&str] = &[
    "AAPL", "MSFT", "AMZN", "NVDA", "GOOGL",
    "META", "TSLA", "BRK-B", "UNH", "JNJ",
    "JPM", "V", "XOM", "PG", "MA",
    "HD", "CVX", "LLY", "MRK", "ABBV",
    "PEP", "KO", "COST", "AVGO", "WMT",
    "MCD", "CSCO", "ACN", "TMO", "ABT",
    "DHR", "LIN", "NEE", "PM", "TXN",
    "UPS", "RTX", "LOW", "ORCL", "AMGN",
    "COP", "UNP", "MS", "GS", "CAT",
    "BA", "DE", "SCHW", "ADP", "BLK",
];

pub const GROUPS: &[StockGroup] = &[
    StockGroup {
        id: "nifty50",
        name: "Nifty 50",
        market: Market::India,
        symbols: NIFTY_50,
    },
    StockGroup {
        id: "sensex",
        name: "Sensex 30",
        market: Market::India,
        symbols: SENSEX_30,
    },
    StockGroup {
        id: "nasdaq100",
        name: "NASDAQ 100",
        market: Market::Us,
        symbols: NASDAQ_100,
    },
    StockGroup {
        id: "sp500_top50",
        name: "S&P 500 (Top 50)",
        market: Market::Us,
        symbols: SP500_TOP_50,
    },
];

/// Groups available for `market`
pub fn list(market: Market) -> Vec<GroupSummary> {
    GROUPS
        .iter()
        .filter(|group| group.market == market)
        .map(|group| GroupSummary {
            id: group.id,
            name: group.name,
            count: group.len(),
        })
        .collect()
}

pub fn find(market: Market, id: &str) -> Option<&'static StockGroup> {
    GROUPS
        .iter()
        .find(|group| group.market == market && group.id.eq_ignore_ascii_case(id.trim()))
}
