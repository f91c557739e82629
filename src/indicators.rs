//! Momentum indicators over closed-candle closes.
//!
//! Both functions mirror the exponentially-weighted moving statistics
//! conventions most charting stacks use: RSI averages gains and losses
//! with the adjusted weighting `(1 - a)^i`, `a = 1/period`, and EMA is
//! the plain recursive form seeded from the first close.

/// Wilder RSI. `None` until `period` price deltas exist
/// (`period + 1` closes).
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let decay = 1.0 - 1.0 / period as f64;

    // Adjusted ewm mean over deltas, newest weighted 1.0.
    let mut gain_num = 0.0;
    let mut loss_num = 0.0;
    let mut denom = 0.0;
    let mut weight = 1.0;
    for w in closes.windows(2).rev() {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            gain_num += weight * delta;
        } else {
            loss_num += weight * (-delta);
        }
        denom += weight;
        weight *= decay;
    }

    let avg_gain = gain_num / denom;
    let avg_loss = loss_num / denom;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Recursive EMA seeded from the first close. `None` until `period`
/// closes exist.
pub fn ema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = closes[0];
    for &close in &closes[1..] {
        value = alpha * close + (1.0 - alpha) * value;
    }
    Some(value)
}
