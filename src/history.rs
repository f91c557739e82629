//! Bounded ring of per-cycle snapshots for chart backfill.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{ScalpSignal, Sentiment, StraddleTrend};

/// One cycle's chart row. Field names are the wire contract of the
/// history feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Wall-clock label, 12-hour with AM/PM.
    pub time: String,
    pub spot: f64,
    pub future: Option<f64>,
    /// Listed future minus spot.
    pub basis: Option<f64>,
    /// Synthetic future minus spot.
    pub real_basis: Option<f64>,
    pub ce: Option<f64>,
    pub pe: Option<f64>,
    pub straddle: Option<f64>,
    pub sma3: Option<f64>,
    pub trend: StraddleTrend,
    pub sentiment: Sentiment,
    pub signal: ScalpSignal,
}

/// Strict FIFO ring, oldest evicted first, read most-recent-last.
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    cap: usize,
}

impl HistoryBuffer {
    pub fn new(cap: usize) -> Self {
        assert!(cap > 0);
        Self { entries: VecDeque::with_capacity(cap), cap }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to the last `n` entries, insertion order preserved.
    pub fn last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn all(&self) -> Vec<HistoryEntry> {
        self.last_n(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(spot: f64) -> HistoryEntry {
        HistoryEntry {
            time: "10:15:00 AM".to_string(),
            spot,
            future: None,
            basis: None,
            real_basis: None,
            ce: None,
            pe: None,
            straddle: None,
            sma3: None,
            trend: StraddleTrend::Flat,
            sentiment: Sentiment::Neutral,
            signal: ScalpSignal::Wait,
        }
    }

    #[test]
    fn eviction_is_strict_fifo() {
        let mut h = HistoryBuffer::new(3);
        for i in 0..5 {
            h.push(entry(i as f64));
        }
        let spots: Vec<f64> = h.all().iter().map(|e| e.spot).collect();
        assert_eq!(spots, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn last_n_is_most_recent_last() {
        let mut h = HistoryBuffer::new(10);
        for i in 0..6 {
            h.push(entry(i as f64));
        }
        let spots: Vec<f64> = h.last_n(2).iter().map(|e| e.spot).collect();
        assert_eq!(spots, vec![4.0, 5.0]);
        // Reads do not mutate.
        assert_eq!(h.len(), 6);
    }

    #[test]
    fn last_n_beyond_len_returns_everything() {
        let mut h = HistoryBuffer::new(10);
        h.push(entry(1.0));
        assert_eq!(h.last_n(100).len(), 1);
    }
}
