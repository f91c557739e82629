//! ATM strike tracking with hysteresis.
//!
//! The tracker decides *when* the option legs need re-resolution; the
//! engine owns the actual resolver call so a failed lookup never
//! disturbs the working state.

use chrono::NaiveDate;

use crate::types::Instrument;

/// Index strike grid spacing in points.
pub const STRIKE_STEP: f64 = 50.0;
/// Spot must drift this far from the held strike before re-centering.
pub const HYSTERESIS_POINTS: f64 = 30.0;

/// A fully resolved ATM option complex. Replaced wholesale on every
/// successful re-resolution, never mutated in place.
#[derive(Clone, Debug, PartialEq)]
pub struct AtmState {
    pub strike: i64,
    pub expiry: NaiveDate,
    /// Trading date the legs were resolved on.
    pub resolved_on: NaiveDate,
    pub future: Instrument,
    pub call: Instrument,
    pub put: Instrument,
}

/// Why a re-resolution fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtmTrigger {
    Initial,
    StrikeShift,
    DateRollover,
}

impl AtmTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            AtmTrigger::Initial => "initial",
            AtmTrigger::StrikeShift => "strike_shift",
            AtmTrigger::DateRollover => "date_rollover",
        }
    }
}

/// Nearest strike on the grid, ties rounding up.
pub fn nearest_strike(spot: f64) -> i64 {
    ((spot / STRIKE_STEP + 0.5).floor() * STRIKE_STEP) as i64
}

/// Decides whether the option complex needs re-resolution for the
/// given spot and trading date.
///
/// With a held state, a strike shift fires only once spot has moved at
/// least [`HYSTERESIS_POINTS`] from the held strike. A date change
/// always fires so a fresh expiry can be picked up.
pub fn resolution_trigger(
    current: Option<&AtmState>,
    spot: f64,
    today: NaiveDate,
) -> Option<(AtmTrigger, i64)> {
    let candidate = nearest_strike(spot);
    let state = match current {
        None => return Some((AtmTrigger::Initial, candidate)),
        Some(s) => s,
    };
    if today != state.resolved_on {
        return Some((AtmTrigger::DateRollover, candidate));
    }
    let dist = (spot - state.strike as f64).abs();
    if dist >= HYSTERESIS_POINTS && candidate != state.strike {
        return Some((AtmTrigger::StrikeShift, candidate));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Instrument;

    fn state(strike: i64, resolved_on: NaiveDate) -> AtmState {
        AtmState {
            strike,
            expiry: resolved_on,
            resolved_on,
            future: Instrument::new("f", "FUT"),
            call: Instrument::new("c", "CE"),
            put: Instrument::new("p", "PE"),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn nearest_strike_rounds_half_up() {
        assert_eq!(nearest_strike(22025.0), 22050);
        assert_eq!(nearest_strike(22024.9), 22000);
        assert_eq!(nearest_strike(22075.0), 22100);
        assert_eq!(nearest_strike(22049.0), 22050);
    }

    #[test]
    fn no_state_triggers_initial() {
        let t = resolution_trigger(None, 22010.0, day(3)).unwrap();
        assert_eq!(t, (AtmTrigger::Initial, 22000));
    }

    #[test]
    fn small_drift_is_absorbed() {
        let s = state(22000, day(3));
        // 29 points away but still rounding to 22000.
        assert!(resolution_trigger(Some(&s), 22029.0, day(3)).is_none());
        // Rounds to 22050 yet inside the 30-point band.
        assert!(resolution_trigger(Some(&s), 22026.0, day(3)).is_none());
    }

    #[test]
    fn drift_at_hysteresis_shifts() {
        let s = state(22000, day(3));
        let t = resolution_trigger(Some(&s), 22030.0, day(3)).unwrap();
        assert_eq!(t, (AtmTrigger::StrikeShift, 22050));
    }

    #[test]
    fn far_drift_lands_on_nearest_strike_not_adjacent() {
        let s = state(22000, day(3));
        let t = resolution_trigger(Some(&s), 22180.0, day(3)).unwrap();
        assert_eq!(t, (AtmTrigger::StrikeShift, 22200));
    }

    #[test]
    fn date_change_fires_even_without_drift() {
        let s = state(22000, day(3));
        let t = resolution_trigger(Some(&s), 22001.0, day(4)).unwrap();
        assert_eq!(t.0, AtmTrigger::DateRollover);
    }
}
