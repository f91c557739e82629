use std::time::Duration;

/// Engine configuration. Operational knobs come from the environment
/// with production defaults; the signal-calibration thresholds live as
/// named constants next to the code that uses them (`signal`, `atm`,
/// `basis`) because the decision table depends on those exact values.
#[derive(Clone, Debug)]
pub struct Config {
    /// Human symbol of the primary index.
    pub symbol: String,
    /// Broker token for the primary index tick stream.
    pub spot_token: String,
    /// Candle aggregation period in seconds.
    pub candle_secs: i64,
    /// Closed candles retained for indicator computation.
    pub candle_window: usize,
    pub rsi_period: usize,
    pub ema_period: usize,
    /// Target cadence of the scalping cycle.
    pub poll_interval: Duration,
    /// Minimum sleep between cycles when a cycle overruns its budget.
    pub poll_floor: Duration,
    /// Cadence of the open-interest poll loop.
    pub oi_poll_interval: Duration,
    /// Snapshot history ring capacity.
    pub history_cap: usize,
    /// Primary-instrument tick tape length.
    pub tick_tape_cap: usize,
    /// Bounded retries for the initial instrument resolution.
    pub setup_max_retries: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            symbol: std::env::var("SYMBOL").unwrap_or_else(|_| "NIFTY 50".to_string()),
            spot_token: std::env::var("SPOT_TOKEN").unwrap_or_else(|_| "99926000".to_string()),
            candle_secs: std::env::var("CANDLE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(60),
            candle_window: std::env::var("CANDLE_WINDOW").ok().and_then(|v| v.parse().ok()).unwrap_or(200),
            rsi_period: std::env::var("RSI_PERIOD").ok().and_then(|v| v.parse().ok()).unwrap_or(14),
            ema_period: std::env::var("EMA_PERIOD").ok().and_then(|v| v.parse().ok()).unwrap_or(50),
            poll_interval: Duration::from_millis(
                std::env::var("POLL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(1000),
            ),
            poll_floor: Duration::from_millis(
                std::env::var("POLL_FLOOR_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(100),
            ),
            oi_poll_interval: Duration::from_secs(
                std::env::var("OI_POLL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            ),
            history_cap: std::env::var("HISTORY_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(1000),
            tick_tape_cap: std::env::var("TICK_TAPE_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(20),
            setup_max_retries: std::env::var("SETUP_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "NIFTY 50".to_string(),
            spot_token: "99926000".to_string(),
            candle_secs: 60,
            candle_window: 200,
            rsi_period: 14,
            ema_period: 50,
            poll_interval: Duration::from_millis(1000),
            poll_floor: Duration::from_millis(100),
            oi_poll_interval: Duration::from_secs(10),
            history_cap: 1000,
            tick_tape_cap: 20,
            setup_max_retries: 5,
        }
    }
}
