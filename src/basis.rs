//! Synthetic-future basis and its relative sentiment score.
//!
//! The synthetic future `strike + call - put` tracks forward pricing
//! more faithfully than the listed future, so the basis is taken
//! against it. Sentiment compares the current basis to its own recent
//! mean instead of an absolute level, which keeps the signal centered
//! as carry decays through the day.

use std::collections::VecDeque;

use crate::types::{round2, Sentiment};

/// Raw basis samples retained for the rolling mean (~5 min at 1 Hz).
pub const BASIS_HISTORY_CAP: usize = 300;
/// Minimum samples before the score deviates from zero.
pub const BASIS_WARMUP: usize = 10;
/// Score band outside which sentiment leaves neutral.
pub const SENTIMENT_BAND: f64 = 3.0;

/// One cycle's basis output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BasisReading {
    /// `strike + call - put - spot`, rounded to 2 decimals.
    pub real_basis: f64,
    /// Deviation of the raw basis from its rolling mean.
    pub score: f64,
    pub sentiment: Sentiment,
}

/// Rolling basis state. Fed only on cycles where both option legs
/// printed fresh; stale premiums are never filled in here because a
/// filled basis would fabricate sentiment.
pub struct BasisEngine {
    history: VecDeque<f64>,
}

impl BasisEngine {
    pub fn new() -> Self {
        Self { history: VecDeque::with_capacity(BASIS_HISTORY_CAP) }
    }

    /// Ingest one cycle with fresh call and put premiums.
    pub fn update(&mut self, strike: f64, call: f64, put: f64, spot: f64) -> BasisReading {
        let raw = strike + call - put - spot;
        if self.history.len() == BASIS_HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(raw);

        let score = if self.history.len() > BASIS_WARMUP {
            let mean: f64 = self.history.iter().sum::<f64>() / self.history.len() as f64;
            raw - mean
        } else {
            0.0
        };

        let sentiment = if score > SENTIMENT_BAND {
            Sentiment::Bullish
        } else if score < -SENTIMENT_BAND {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        };

        BasisReading { real_basis: round2(raw), score, sentiment }
    }

    pub fn samples(&self) -> usize {
        self.history.len()
    }

    /// Drop accumulated history, used when the strike complex changes
    /// so the mean is not a blend of two strikes.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for BasisEngine {
    fn default() -> Self {
        Self::new()
    }
}
