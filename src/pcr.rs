//! Put-call ratio from live ATM open interest.

use crate::types::round2;

/// PCR above this reads as an over-hedged extreme.
pub const PCR_TRAP_HIGH: f64 = 2.0;
/// PCR below this reads as a bearishly stacked extreme.
pub const PCR_TRAP_LOW: f64 = 0.5;

/// Latest PCR with its update timestamp. Starts at a neutral 1.0 so
/// the signal logic has a sane ratio before the first OI poll lands.
#[derive(Clone, Copy, Debug)]
pub struct PcrState {
    pub value: f64,
    /// Unix millis of the last successful OI sample.
    pub updated_ms: u64,
}

impl PcrState {
    pub fn new(now_ms: u64) -> Self {
        Self { value: 1.0, updated_ms: now_ms }
    }

    /// Apply one OI sample. Zero call OI would divide away, so the
    /// sample is rejected and the previous ratio stands.
    pub fn apply(&mut self, call_oi: f64, put_oi: f64, now_ms: u64) -> bool {
        if call_oi <= 0.0 {
            return false;
        }
        self.value = round2(put_oi / call_oi);
        self.updated_ms = now_ms;
        true
    }

    /// At an extreme the OI picture itself is suspect.
    pub fn is_extreme(&self) -> bool {
        self.value > PCR_TRAP_HIGH || self.value < PCR_TRAP_LOW
    }

    pub fn age_secs(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.updated_ms) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_neutral() {
        let p = PcrState::new(1_000);
        assert_eq!(p.value, 1.0);
        assert!(!p.is_extreme());
    }

    #[test]
    fn ratio_is_put_over_call_rounded() {
        let mut p = PcrState::new(0);
        assert!(p.apply(3_000_000.0, 4_000_000.0, 5_000));
        assert_eq!(p.value, 1.33);
        assert_eq!(p.updated_ms, 5_000);
    }

    #[test]
    fn zero_call_oi_is_rejected() {
        let mut p = PcrState::new(0);
        p.apply(1_000.0, 800.0, 1_000);
        assert!(!p.apply(0.0, 900.0, 2_000));
        assert_eq!(p.value, 0.8);
        assert_eq!(p.updated_ms, 1_000);
    }

    #[test]
    fn extremes_flag_both_tails() {
        let mut p = PcrState::new(0);
        p.apply(1_000.0, 2_100.0, 0);
        assert!(p.is_extreme());
        p.apply(1_000.0, 400.0, 0);
        assert!(p.is_extreme());
        p.apply(1_000.0, 1_000.0, 0);
        assert!(!p.is_extreme());
    }

    #[test]
    fn age_tracks_last_success() {
        let mut p = PcrState::new(0);
        p.apply(10.0, 10.0, 4_000);
        assert_eq!(p.age_secs(19_000), 15);
    }
}
