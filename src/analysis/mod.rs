// Signal engine: per-symbol analyzers producing sections lazily.
// Each entry function fetches everything it needs first, so a NotFound
// surfaces before the first section.

pub mod canslim;
pub mod format;
pub mod fundamental;
pub mod piotroski;
pub mod technical;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::market::Market;
use crate::models::Section;
use crate::provider::DataProvider;
use crate::Result;

pub use canslim::{canslim_analysis, CanSlimAnalysis, CanSlimInputs};
pub use fundamental::{fundamental_analysis, FundamentalAnalysis};
pub use piotroski::{piotroski_analysis, PiotroskiAnalysis};
pub use technical::{technical_analysis, TechnicalAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Technical,
    Fundamental,
    Piotroski,
    Canslim,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Technical,
        AnalysisKind::Fundamental,
        AnalysisKind::Piotroski,
        AnalysisKind::Canslim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Technical => "technical",
            AnalysisKind::Fundamental => "fundamental",
            AnalysisKind::Piotroski => "piotroski",
            AnalysisKind::Canslim => "canslim",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnalysisKind::Technical => "Technical Analysis",
            AnalysisKind::Fundamental => "Fundamental Analysis",
            AnalysisKind::Piotroski => "Piotroski F-Score",
            AnalysisKind::Canslim => "CAN SLIM",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        AnalysisKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AnalysisError::InvalidInput(format!("unknown analysis kind: {}", s)))
    }
}

/// Any analyzer's section sequence
#[derive(Debug, Clone)]
pub enum Analysis {
    Technical(TechnicalAnalysis),
    Fundamental(FundamentalAnalysis),
    Piotroski(PiotroskiAnalysis),
    CanSlim(CanSlimAnalysis),
}

impl Iterator for Analysis {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        match self {
            Analysis::Technical(inner) => inner.next(),
            Analysis::Fundamental(inner) => inner.next(),
            Analysis::Piotroski(inner) => inner.next(),
            Analysis::CanSlim(inner) => inner.next(),
        }
    }
}

/// Fetch inputs for `kind` and return its section sequence
pub async fn run_analysis<P: DataProvider>(
    provider: &P,
    symbol: &str,
    market: Market,
    kind: AnalysisKind,
) -> Result<Analysis> {
    Ok(match kind {
        AnalysisKind::Technical => {
            Analysis::Technical(technical_analysis(provider, symbol, market).await?)
        }
        AnalysisKind::Fundamental => {
            Analysis::Fundamental(fundamental_analysis(provider, symbol, market).await?)
        }
        AnalysisKind::Piotroski => {
            Analysis::Piotroski(piotroski_analysis(provider, symbol, market).await?)
        }
        AnalysisKind::Canslim => {
            Analysis::CanSlim(canslim_analysis(provider, symbol, market).await?)
        }
    })
}
