//! Signal fusion: velocity, PCR, basis and the late-session guard.
//!
//! The thresholds here are calibration values carried from live
//! trading logs. They define the contract of the decision table, so
//! they stay as named constants with their exact values.

use std::collections::VecDeque;

use chrono::{NaiveTime, Timelike};

use crate::types::{ScalpSignal, SpotTrend};

/// Mean per-second spot move that counts as directional momentum.
pub const VELOCITY_ENTRY: f64 = 0.4;
/// Below this absolute velocity the market reads as sideways.
pub const VELOCITY_FLAT: f64 = 0.2;
/// Basis below this while price rises means futures are in deep
/// discount; upside momentum is distrusted.
pub const BASIS_CRASH_FLOOR: f64 = -50.0;
/// PCR at or above this confirms bullish open interest.
pub const PCR_BULLISH_MIN: f64 = 1.0;
/// PCR below this reads as heavy call writing against the move.
pub const PCR_BEARISH_MAX: f64 = 0.6;
/// Sentiment score above this with real momentum marks a short
/// squeeze, overriding the call-writing block.
pub const SQUEEZE_SENTIMENT: f64 = 5.0;

/// Late-session guard activates at this wall-clock time.
pub const LATE_SESSION_HOUR: u32 = 14;
pub const LATE_SESSION_MINUTE: u32 = 55;

/// Spot samples kept by the trend gauge.
pub const TREND_WINDOW: usize = 20;
/// Samples needed before the gauge leaves `Sideways`.
pub const TREND_MIN_SAMPLES: usize = 5;
/// Points around the rolling mean that still read as sideways.
pub const TREND_BAND: f64 = 2.0;

/// Per-cycle inputs to the decision table.
#[derive(Clone, Copy, Debug)]
pub struct SignalInputs {
    pub velocity: f64,
    pub pcr: f64,
    /// Synthetic basis this cycle, absent when an option leg was stale.
    pub real_basis: Option<f64>,
    pub sentiment_score: f64,
}

/// Fused output plus the human-readable reason shown downstream.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub signal: ScalpSignal,
    pub suggestion: String,
    pub is_trap: bool,
}

impl Decision {
    fn wait(suggestion: impl Into<String>) -> Self {
        Self { signal: ScalpSignal::Wait, suggestion: suggestion.into(), is_trap: false }
    }

    fn trap(suggestion: String) -> Self {
        Self { signal: ScalpSignal::Trap, suggestion, is_trap: true }
    }
}

/// The decision table. Evaluated top-to-bottom, first match wins.
pub fn decide(inputs: SignalInputs) -> Decision {
    let SignalInputs { velocity, pcr, real_basis, sentiment_score } = inputs;

    if velocity > VELOCITY_ENTRY {
        if pcr >= PCR_BULLISH_MIN {
            return match real_basis {
                Some(basis) if basis > BASIS_CRASH_FLOOR => Decision {
                    signal: ScalpSignal::BuyCall,
                    suggestion: format!("MOMENTUM UP ({velocity:.2}) - BUY CE"),
                    is_trap: false,
                },
                Some(_) => Decision::wait("Price Rising but Basis Crashed (Trap?)"),
                None => Decision::wait("Momentum up, awaiting fresh basis"),
            };
        }
        if pcr < PCR_BEARISH_MAX {
            // Short squeeze: panic buying with real momentum overrides
            // the bearish OI block.
            if sentiment_score > SQUEEZE_SENTIMENT {
                return Decision {
                    signal: ScalpSignal::BuyCall,
                    suggestion: format!(
                        "SHORT SQUEEZE (Sent {sentiment_score:.1} + Vel {velocity:.2})"
                    ),
                    is_trap: false,
                };
            }
            return Decision::trap(format!(
                "BULL TRAP! Bearish OI (PCR {pcr:.2}) - Price Rising but Smart Money SELLING"
            ));
        }
        return Decision::trap(format!("Weak OI Support (PCR={pcr:.2})"));
    }

    if velocity < -VELOCITY_ENTRY {
        if pcr <= PCR_BULLISH_MIN {
            return Decision {
                signal: ScalpSignal::BuyPut,
                suggestion: format!("MOMENTUM DOWN ({velocity:.2}) - BUY PE"),
                is_trap: false,
            };
        }
        return Decision::trap(format!(
            "BEAR TRAP! PCR={pcr:.2} (HIGH) - Price Falling but Bullish OI"
        ));
    }

    if velocity.abs() < VELOCITY_FLAT {
        return Decision::wait("SIDEWAYS - Scalping Zone");
    }

    Decision::wait("Waiting for Setup...")
}

/// Short-horizon price-trend gauge feeding the late-session guard.
///
/// Plain mean over the last [`TREND_WINDOW`] spots with a dead band;
/// cheap and stable over the handful of minutes it matters.
pub struct SpotTrendGauge {
    spots: VecDeque<f64>,
}

impl SpotTrendGauge {
    pub fn new() -> Self {
        Self { spots: VecDeque::with_capacity(TREND_WINDOW) }
    }

    /// Record the spot and classify the trend it implies.
    pub fn observe(&mut self, spot: f64) -> SpotTrend {
        if spot > 0.0 {
            if self.spots.len() == TREND_WINDOW {
                self.spots.pop_front();
            }
            self.spots.push_back(spot);
        }
        if self.spots.len() < TREND_MIN_SAMPLES {
            return SpotTrend::Sideways;
        }
        let mean: f64 = self.spots.iter().sum::<f64>() / self.spots.len() as f64;
        if spot > mean + TREND_BAND {
            SpotTrend::Up
        } else if spot < mean - TREND_BAND {
            SpotTrend::Down
        } else {
            SpotTrend::Sideways
        }
    }
}

impl Default for SpotTrendGauge {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_late_session(now: NaiveTime) -> bool {
    now.hour() > LATE_SESSION_HOUR
        || (now.hour() == LATE_SESSION_HOUR && now.minute() >= LATE_SESSION_MINUTE)
}

/// Late-session guard: from 14:55 the price trend is trusted over the
/// basis-derived signal. A directional signal against (or without) a
/// matching trend is downgraded to `Wait` and flagged.
pub fn apply_late_session(decision: &mut Decision, trend: SpotTrend, now: NaiveTime) {
    if !is_late_session(now) {
        return;
    }
    match decision.signal {
        ScalpSignal::BuyPut if matches!(trend, SpotTrend::Up | SpotTrend::Sideways) => {
            decision.signal = ScalpSignal::Wait;
            decision.is_trap = true;
            decision.suggestion =
                format!("3PM SAFETY: Price Trend is {trend} - Blocking Bearish Signal (Need DOWN)");
        }
        ScalpSignal::BuyCall if matches!(trend, SpotTrend::Down | SpotTrend::Sideways) => {
            decision.signal = ScalpSignal::Wait;
            decision.is_trap = true;
            decision.suggestion =
                format!("3PM SAFETY: Price Trend is {trend} - Blocking Bullish Signal (Need UP)");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(velocity: f64, pcr: f64, basis: f64, score: f64) -> SignalInputs {
        SignalInputs { velocity, pcr, real_basis: Some(basis), sentiment_score: score }
    }

    #[test]
    fn momentum_up_with_bullish_oi_buys_call() {
        let d = decide(inputs(0.5, 1.2, -10.0, 0.0));
        assert_eq!(d.signal, ScalpSignal::BuyCall);
        assert!(!d.is_trap);
        assert!(d.suggestion.contains("BUY CE"));
    }

    #[test]
    fn crashed_basis_blocks_the_call() {
        let d = decide(inputs(0.5, 1.2, -55.0, 0.0));
        assert_eq!(d.signal, ScalpSignal::Wait);
        assert!(d.suggestion.contains("Basis Crashed"));
    }

    #[test]
    fn missing_basis_waits_instead_of_buying() {
        let d = decide(SignalInputs {
            velocity: 0.5,
            pcr: 1.2,
            real_basis: None,
            sentiment_score: 0.0,
        });
        assert_eq!(d.signal, ScalpSignal::Wait);
    }

    #[test]
    fn squeeze_overrides_bearish_oi() {
        let d = decide(inputs(0.5, 0.4, 0.0, 6.0));
        assert_eq!(d.signal, ScalpSignal::BuyCall);
        assert!(!d.is_trap);
        assert!(d.suggestion.contains("SHORT SQUEEZE"));
    }

    #[test]
    fn bearish_oi_without_squeeze_is_a_bull_trap() {
        let d = decide(inputs(0.5, 0.4, 0.0, 1.0));
        assert_eq!(d.signal, ScalpSignal::Trap);
        assert!(d.is_trap);
        assert!(d.suggestion.contains("BULL TRAP"));
    }

    #[test]
    fn neutral_oi_zone_is_a_trap_too() {
        let d = decide(inputs(0.5, 0.8, 0.0, 0.0));
        assert_eq!(d.signal, ScalpSignal::Trap);
        assert!(d.suggestion.contains("Weak OI Support"));
    }

    #[test]
    fn momentum_down_with_bearish_oi_buys_put() {
        let d = decide(inputs(-0.5, 0.9, 0.0, 0.0));
        assert_eq!(d.signal, ScalpSignal::BuyPut);
        assert!(d.suggestion.contains("BUY PE"));
    }

    #[test]
    fn falling_price_with_bullish_oi_is_a_bear_trap() {
        let d = decide(inputs(-0.5, 1.3, 0.0, 0.0));
        assert_eq!(d.signal, ScalpSignal::Trap);
        assert!(d.suggestion.contains("BEAR TRAP"));
    }

    #[test]
    fn low_velocity_is_sideways() {
        let d = decide(inputs(0.1, 1.0, 0.0, 0.0));
        assert_eq!(d.signal, ScalpSignal::Wait);
        assert!(!d.is_trap);
        assert!(d.suggestion.contains("SIDEWAYS"));
    }

    #[test]
    fn mid_velocity_waits_without_sideways_label() {
        let d = decide(inputs(0.3, 1.0, 0.0, 0.0));
        assert_eq!(d.signal, ScalpSignal::Wait);
        assert_eq!(d.suggestion, "Waiting for Setup...");
    }

    #[test]
    fn gauge_needs_five_samples() {
        let mut g = SpotTrendGauge::new();
        for _ in 0..4 {
            assert_eq!(g.observe(22000.0), SpotTrend::Sideways);
        }
    }

    #[test]
    fn gauge_reads_direction_outside_the_band() {
        let mut g = SpotTrendGauge::new();
        for _ in 0..10 {
            g.observe(22000.0);
        }
        assert_eq!(g.observe(22010.0), SpotTrend::Up);
        let mut g = SpotTrendGauge::new();
        for _ in 0..10 {
            g.observe(22000.0);
        }
        assert_eq!(g.observe(21990.0), SpotTrend::Down);
    }

    #[test]
    fn gauge_holds_sideways_inside_the_band() {
        let mut g = SpotTrendGauge::new();
        for _ in 0..10 {
            g.observe(22000.0);
        }
        assert_eq!(g.observe(22001.0), SpotTrend::Sideways);
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn guard_is_inactive_before_1455() {
        let mut d = decide(inputs(-0.5, 0.9, 0.0, 0.0));
        apply_late_session(&mut d, SpotTrend::Up, t(14, 54));
        assert_eq!(d.signal, ScalpSignal::BuyPut);
    }

    #[test]
    fn guard_blocks_put_against_rising_trend() {
        let mut d = decide(inputs(-0.5, 0.9, 0.0, 0.0));
        apply_late_session(&mut d, SpotTrend::Up, t(14, 55));
        assert_eq!(d.signal, ScalpSignal::Wait);
        assert!(d.is_trap);
        assert!(d.suggestion.contains("3PM SAFETY"));
    }

    #[test]
    fn guard_blocks_call_in_sideways_trend() {
        let mut d = decide(inputs(0.5, 1.2, 0.0, 0.0));
        apply_late_session(&mut d, SpotTrend::Sideways, t(15, 10));
        assert_eq!(d.signal, ScalpSignal::Wait);
        assert!(d.is_trap);
    }

    #[test]
    fn guard_lets_aligned_signals_through() {
        let mut d = decide(inputs(0.5, 1.2, 0.0, 0.0));
        apply_late_session(&mut d, SpotTrend::Up, t(15, 0));
        assert_eq!(d.signal, ScalpSignal::BuyCall);
        let mut d = decide(inputs(-0.5, 0.9, 0.0, 0.0));
        apply_late_session(&mut d, SpotTrend::Down, t(15, 0));
        assert_eq!(d.signal, ScalpSignal::BuyPut);
    }
}
