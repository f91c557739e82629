//! ATM straddle price and short-window trend.

use std::collections::VecDeque;

use crate::types::{round2, StraddleTrend};

/// Straddle prices kept for trend detection.
pub const STRADDLE_WINDOW: usize = 5;
/// Prices needed before the SMA3 (and a non-flat trend) exists.
pub const SMA_PERIOD: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StraddleReading {
    /// Average of the two premiums, rounded to 2 decimals. Carried
    /// forward from the last print when a leg is stale this cycle.
    pub price: Option<f64>,
    pub sma3: Option<f64>,
    pub trend: StraddleTrend,
}

/// Tracks the straddle mid-price across cycles.
///
/// Unlike the basis, the straddle is forward filled on stale legs: a
/// one-cycle gap should not put a hole in the premium-decay picture
/// the trend reads from.
pub struct StraddleTrendEngine {
    window: VecDeque<f64>,
    last_price: Option<f64>,
}

impl StraddleTrendEngine {
    pub fn new() -> Self {
        Self { window: VecDeque::with_capacity(STRADDLE_WINDOW), last_price: None }
    }

    /// Ingest one cycle. `legs` carries fresh call/put premiums, or
    /// `None` when either leg is stale.
    pub fn update(&mut self, legs: Option<(f64, f64)>) -> StraddleReading {
        let price = match legs {
            Some((call, put)) => {
                let p = round2((call + put) / 2.0);
                self.last_price = Some(p);
                Some(p)
            }
            None => self.last_price,
        };

        let Some(price) = price else {
            return StraddleReading { price: None, sma3: None, trend: StraddleTrend::Flat };
        };

        if self.window.len() == STRADDLE_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(price);

        let sma3 = if self.window.len() >= SMA_PERIOD {
            let tail: f64 = self.window.iter().rev().take(SMA_PERIOD).sum();
            Some(round2(tail / SMA_PERIOD as f64))
        } else {
            None
        };

        let trend = match sma3 {
            Some(sma) if price > sma => StraddleTrend::Rising,
            Some(sma) if price < sma => StraddleTrend::Falling,
            _ => StraddleTrend::Flat,
        };

        StraddleReading { price: Some(price), sma3, trend }
    }

    /// On a strike change the old window reads against the wrong
    /// strike's premiums. The forward-fill seed is kept so the chart
    /// stream stays unbroken until the new legs print.
    pub fn clear_window(&mut self) {
        self.window.clear();
    }
}

impl Default for StraddleTrendEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_yields_nothing() {
        let mut s = StraddleTrendEngine::new();
        let r = s.update(None);
        assert_eq!(r.price, None);
        assert_eq!(r.sma3, None);
        assert_eq!(r.trend, StraddleTrend::Flat);
    }

    #[test]
    fn price_is_mean_of_legs_rounded() {
        let mut s = StraddleTrendEngine::new();
        let r = s.update(Some((127.70, 94.35)));
        assert_eq!(r.price, Some(111.03));
        assert_eq!(r.sma3, None);
    }

    #[test]
    fn stale_leg_forward_fills_last_print() {
        let mut s = StraddleTrendEngine::new();
        s.update(Some((100.0, 100.0)));
        let r = s.update(None);
        assert_eq!(r.price, Some(100.0));
        // The filled price still feeds the window.
        let r = s.update(None);
        assert_eq!(r.price, Some(100.0));
        assert_eq!(r.sma3, Some(100.0));
    }

    #[test]
    fn rising_premiums_read_rising() {
        let mut s = StraddleTrendEngine::new();
        s.update(Some((100.0, 100.0)));
        s.update(Some((102.0, 102.0)));
        let r = s.update(Some((104.0, 104.0)));
        // price 104 vs sma3 of [100, 102, 104] = 102.
        assert_eq!(r.sma3, Some(102.0));
        assert_eq!(r.trend, StraddleTrend::Rising);
    }

    #[test]
    fn falling_premiums_read_falling() {
        let mut s = StraddleTrendEngine::new();
        s.update(Some((104.0, 104.0)));
        s.update(Some((102.0, 102.0)));
        let r = s.update(Some((100.0, 100.0)));
        assert_eq!(r.trend, StraddleTrend::Falling);
    }

    #[test]
    fn flat_when_price_equals_sma() {
        let mut s = StraddleTrendEngine::new();
        for _ in 0..4 {
            let r = s.update(Some((100.0, 100.0)));
            if r.sma3.is_some() {
                assert_eq!(r.trend, StraddleTrend::Flat);
            }
        }
    }

    #[test]
    fn clear_window_keeps_forward_fill_seed() {
        let mut s = StraddleTrendEngine::new();
        for _ in 0..4 {
            s.update(Some((100.0, 100.0)));
        }
        s.clear_window();
        let r = s.update(None);
        assert_eq!(r.price, Some(100.0));
        assert_eq!(r.sma3, None);
        assert_eq!(r.trend, StraddleTrend::Flat);
    }

    #[test]
    fn window_is_bounded_to_five() {
        let mut s = StraddleTrendEngine::new();
        for i in 0..8 {
            s.update(Some((100.0 + i as f64, 100.0 + i as f64)));
        }
        assert_eq!(s.window.len(), STRADDLE_WINDOW);
    }
}
