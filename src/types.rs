//! Core domain types shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of instrument roles the engine understands. External
/// token identifiers are mapped onto these once per ATM-tracking
/// cycle; nothing downstream ever sees a raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentRole {
    Spot,
    Future,
    Call,
    Put,
}

/// A resolved tradeable instrument: broker token plus human symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub token: String,
    pub symbol: String,
}

impl Instrument {
    pub fn new(token: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self { token: token.into(), symbol: symbol.into() }
    }
}

/// A single price update. Ephemeral: folded into derived state and
/// dropped.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub role: InstrumentRole,
    pub price: f64,
    pub ts_ms: u64,
}

/// Basis-derived market sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    #[serde(rename = "BULLISH")]
    Bullish,
    #[serde(rename = "BEARISH")]
    Bearish,
    #[serde(rename = "NEUTRAL")]
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Bullish => write!(f, "BULLISH"),
            Sentiment::Bearish => write!(f, "BEARISH"),
            Sentiment::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Straddle premium trend relative to its short moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StraddleTrend {
    #[serde(rename = "RISING")]
    Rising,
    #[serde(rename = "FALLING")]
    Falling,
    #[serde(rename = "FLAT")]
    Flat,
}

impl fmt::Display for StraddleTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StraddleTrend::Rising => write!(f, "RISING"),
            StraddleTrend::Falling => write!(f, "FALLING"),
            StraddleTrend::Flat => write!(f, "FLAT"),
        }
    }
}

/// Short-horizon spot price trend used by the late-session override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotTrend {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
    #[serde(rename = "SIDEWAYS")]
    Sideways,
}

impl fmt::Display for SpotTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpotTrend::Up => write!(f, "UP"),
            SpotTrend::Down => write!(f, "DOWN"),
            SpotTrend::Sideways => write!(f, "SIDEWAYS"),
        }
    }
}

/// Final fused output of the signal state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalpSignal {
    #[serde(rename = "WAIT")]
    Wait,
    #[serde(rename = "BUY CALL")]
    BuyCall,
    #[serde(rename = "BUY PUT")]
    BuyPut,
    #[serde(rename = "TRAP")]
    Trap,
}

impl fmt::Display for ScalpSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalpSignal::Wait => write!(f, "WAIT"),
            ScalpSignal::BuyCall => write!(f, "BUY CALL"),
            ScalpSignal::BuyPut => write!(f, "BUY PUT"),
            ScalpSignal::Trap => write!(f, "TRAP"),
        }
    }
}

impl ScalpSignal {
    /// True for outputs worth logging as trade suggestions.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, ScalpSignal::Wait)
    }
}

/// Round to two decimals, half away from zero. Used everywhere a
/// price-like value crosses an observable boundary (straddle, basis,
/// PCR) so snapshots match the original dashboard's contract.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
