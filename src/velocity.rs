//! Spot velocity in points per cycle.

use std::collections::VecDeque;

/// Per-cycle spot deltas kept for the momentum average.
pub const MOMENTUM_WINDOW: usize = 20;

/// Averages per-cycle spot changes over a short window. Updated once
/// per scalping cycle, so at the 1 Hz cadence the value reads as
/// points per second.
pub struct VelocityEngine {
    deltas: VecDeque<f64>,
    last_spot: Option<f64>,
}

impl VelocityEngine {
    pub fn new() -> Self {
        Self { deltas: VecDeque::with_capacity(MOMENTUM_WINDOW), last_spot: None }
    }

    /// Record this cycle's spot and return the updated velocity. The
    /// first observation only seeds the baseline and reads 0.
    pub fn update(&mut self, spot: f64) -> f64 {
        if let Some(last) = self.last_spot {
            if self.deltas.len() == MOMENTUM_WINDOW {
                self.deltas.pop_front();
            }
            self.deltas.push_back(spot - last);
        }
        self.last_spot = Some(spot);
        self.current()
    }

    pub fn current(&self) -> f64 {
        if self.deltas.is_empty() {
            return 0.0;
        }
        self.deltas.iter().sum::<f64>() / self.deltas.len() as f64
    }
}

impl Default for VelocityEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_reads_zero() {
        let mut v = VelocityEngine::new();
        assert_eq!(v.update(22000.0), 0.0);
    }

    #[test]
    fn steady_climb_reads_the_step_size() {
        let mut v = VelocityEngine::new();
        let mut spot = 22000.0;
        let mut vel = 0.0;
        for _ in 0..10 {
            spot += 0.5;
            vel = v.update(spot);
        }
        assert!((vel - 0.5).abs() < 1e-9, "vel {vel}");
    }

    #[test]
    fn window_forgets_old_moves() {
        let mut v = VelocityEngine::new();
        let mut spot = 22000.0;
        v.update(spot);
        // One big spike, then a long flat stretch.
        spot += 10.0;
        v.update(spot);
        let mut vel = 0.0;
        for _ in 0..MOMENTUM_WINDOW {
            vel = v.update(spot);
        }
        assert_eq!(vel, 0.0);
    }

    #[test]
    fn mixed_moves_average_out() {
        let mut v = VelocityEngine::new();
        v.update(22000.0);
        v.update(22002.0);
        let vel = v.update(22000.0);
        assert_eq!(vel, 0.0);
    }
}
