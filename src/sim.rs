//! Scenario simulator: canned market regimes behind the feed traits.
//!
//! Used by the integration tests and the `--sim` run mode to exercise
//! the whole engine with no broker session.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::Rng;

use crate::feed::{
    AtmResolution, InstrumentResolver, LegQuotes, OiSample, OiSource, PriceFetcher, TickSource,
};
use crate::types::{Instrument, InstrumentRole, Tick};

/// One simulated market state: spot plus the three linked legs and the
/// OI ratio backing them.
#[derive(Clone, Copy, Debug)]
pub struct SimTick {
    pub spot: f64,
    pub future: f64,
    pub ce: f64,
    pub pe: f64,
    pub pcr: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// Spot chops in a tight band while premiums decay.
    RangeBound,
    /// Fast rise, call premium explodes, future expands.
    BullRun,
    /// Fast drop, put premium explodes, future discounts.
    BearCrash,
    /// Bull-run prices with bearishly stacked OI.
    BullTrap,
}

impl Scenario {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "range" => Some(Scenario::RangeBound),
            "bull" => Some(Scenario::BullRun),
            "bear" => Some(Scenario::BearCrash),
            "trap" => Some(Scenario::BullTrap),
            _ => None,
        }
    }
}

/// Generate `n` ticks of the given regime starting at 24000.
pub fn scenario_ticks(scenario: Scenario, n: usize) -> Vec<SimTick> {
    let mut ticks = Vec::with_capacity(n);
    let mut spot = 24_000.0;
    match scenario {
        Scenario::RangeBound => {
            let mut rng = rand::thread_rng();
            for i in 0..n {
                spot += [-2.0, 2.0, 0.0][rng.gen_range(0..3)];
                let decay = 100.0 - i as f64 * 0.5;
                ticks.push(SimTick {
                    spot,
                    future: spot + 50.0,
                    ce: decay,
                    pe: decay,
                    pcr: 1.0,
                });
            }
        }
        Scenario::BullRun | Scenario::BullTrap => {
            let pcr = if scenario == Scenario::BullTrap { 0.4 } else { 1.0 };
            let mut ce = 100.0;
            let mut pe = 100.0;
            for i in 0..n {
                spot += 10.0;
                ce += 8.0;
                pe -= 3.0;
                ticks.push(SimTick {
                    spot,
                    future: spot + 60.0 + i as f64 * 2.0,
                    ce,
                    pe,
                    pcr,
                });
            }
        }
        Scenario::BearCrash => {
            let mut ce = 100.0;
            let mut pe = 100.0;
            for i in 0..n {
                spot -= 10.0;
                ce -= 3.0;
                pe += 8.0;
                ticks.push(SimTick {
                    spot,
                    future: spot + 40.0 - i as f64 * 2.0,
                    ce,
                    pe,
                    pcr: 1.0,
                });
            }
        }
    }
    ticks
}

/// Weekly index expiry: the next Thursday on or after `from`.
pub fn next_expiry(from: NaiveDate) -> NaiveDate {
    let ahead = (Weekday::Thu.num_days_from_monday() + 7
        - from.weekday().num_days_from_monday())
        % 7;
    from + chrono::Duration::days(ahead as i64)
}

fn option_symbol(symbol_root: &str, expiry: NaiveDate, strike: i64, kind: &str) -> String {
    format!(
        "{}{}{}{}",
        symbol_root,
        expiry.format("%d%b%y").to_string().to_uppercase(),
        strike,
        kind
    )
}

/// Deterministic feed over a pre-generated tick script. The cursor is
/// advanced by the tick source; quote and OI fetches read whatever
/// tick the cursor currently points at.
pub struct SimFeed {
    ticks: Vec<SimTick>,
    cursor: AtomicUsize,
    today: NaiveDate,
    fail_resolutions: AtomicU32,
    fail_quotes: AtomicU32,
}

impl SimFeed {
    pub fn new(ticks: Vec<SimTick>, today: NaiveDate) -> Self {
        Self {
            ticks,
            cursor: AtomicUsize::new(0),
            today,
            fail_resolutions: AtomicU32::new(0),
            fail_quotes: AtomicU32::new(0),
        }
    }

    /// Make the next `n` resolution calls fail.
    pub fn fail_next_resolutions(&self, n: u32) {
        self.fail_resolutions.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` quote fetches fail.
    pub fn fail_next_quotes(&self, n: u32) {
        self.fail_quotes.store(n, Ordering::SeqCst);
    }

    pub fn advance(&self) -> Option<SimTick> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.ticks.get(idx).copied()
    }

    fn current(&self) -> Option<SimTick> {
        let idx = self.cursor.load(Ordering::SeqCst).saturating_sub(1);
        self.ticks.get(idx).copied()
    }
}

#[async_trait]
impl InstrumentResolver for SimFeed {
    async fn resolve_atm(&self, symbol: &str, strike: i64) -> Result<AtmResolution> {
        let remaining = self.fail_resolutions.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_resolutions.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("instrument master unavailable"));
        }
        let root = symbol.split_whitespace().next().unwrap_or(symbol);
        let expiry = next_expiry(self.today);
        Ok(AtmResolution {
            strike,
            expiry,
            future: Some(Instrument::new(
                format!("sim-fut-{strike}"),
                option_symbol(root, expiry, strike, "FUT"),
            )),
            call: Some(Instrument::new(
                format!("sim-ce-{strike}"),
                option_symbol(root, expiry, strike, "CE"),
            )),
            put: Some(Instrument::new(
                format!("sim-pe-{strike}"),
                option_symbol(root, expiry, strike, "PE"),
            )),
        })
    }
}

#[async_trait]
impl PriceFetcher for SimFeed {
    async fn leg_quotes(
        &self,
        _future: &Instrument,
        _call: &Instrument,
        _put: &Instrument,
    ) -> Result<LegQuotes> {
        let remaining = self.fail_quotes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_quotes.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("quote endpoint timed out"));
        }
        match self.current() {
            Some(tick) => Ok(LegQuotes {
                future: Some(tick.future),
                call: Some(tick.ce),
                put: Some(tick.pe),
            }),
            None => Ok(LegQuotes::default()),
        }
    }
}

#[async_trait]
impl OiSource for SimFeed {
    async fn fetch_oi(&self, _call: &Instrument, _put: &Instrument) -> Result<OiSample> {
        let pcr = self.current().map(|t| t.pcr).unwrap_or(1.0);
        let call_oi = 1_000_000.0;
        Ok(OiSample { call_oi, put_oi: call_oi * pcr })
    }
}

/// Spot tick stream riding the same cursor as the quote feed.
pub struct SimTickSource {
    feed: std::sync::Arc<SimFeed>,
    ts_ms: u64,
    pace: Option<std::time::Duration>,
}

impl SimTickSource {
    pub fn new(feed: std::sync::Arc<SimFeed>, start_ms: u64) -> Self {
        Self { feed, ts_ms: start_ms, pace: None }
    }

    /// Real-time playback: one tick per `interval`, for driving the
    /// concurrent loops the way a live stream would.
    pub fn paced(feed: std::sync::Arc<SimFeed>, start_ms: u64, interval: std::time::Duration) -> Self {
        Self { feed, ts_ms: start_ms, pace: Some(interval) }
    }
}

#[async_trait]
impl TickSource for SimTickSource {
    async fn next_tick(&mut self) -> Option<Tick> {
        if let Some(interval) = self.pace {
            tokio::time::sleep(interval).await;
        }
        let tick = self.feed.advance()?;
        self.ts_ms += 1_000;
        Some(Tick { role: InstrumentRole::Spot, price: tick.spot, ts_ms: self.ts_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bull_run_shapes_a_rally() {
        let ticks = scenario_ticks(Scenario::BullRun, 20);
        assert_eq!(ticks.len(), 20);
        assert_eq!(ticks[0].spot, 24_010.0);
        assert_eq!(ticks[19].spot, 24_200.0);
        assert!(ticks[19].ce > ticks[0].ce);
        assert!(ticks[19].pe < ticks[0].pe);
    }

    #[test]
    fn trap_is_a_rally_with_low_pcr() {
        let bull = scenario_ticks(Scenario::BullRun, 5);
        let trap = scenario_ticks(Scenario::BullTrap, 5);
        for (b, t) in bull.iter().zip(&trap) {
            assert_eq!(b.spot, t.spot);
            assert_eq!(t.pcr, 0.4);
            assert_eq!(b.pcr, 1.0);
        }
    }

    #[test]
    fn range_stays_in_band() {
        let ticks = scenario_ticks(Scenario::RangeBound, 20);
        for t in &ticks {
            assert!((t.spot - 24_000.0).abs() <= 40.0);
        }
    }

    #[test]
    fn expiry_is_next_thursday() {
        // 2024-06-03 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(next_expiry(monday), NaiveDate::from_ymd_opt(2024, 6, 6).unwrap());
        // A Thursday expires same-day.
        let thursday = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();
        assert_eq!(next_expiry(thursday), thursday);
    }

    #[tokio::test]
    async fn cursor_links_ticks_and_quotes() {
        let feed = std::sync::Arc::new(SimFeed::new(
            scenario_ticks(Scenario::BullRun, 3),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        ));
        let mut src = SimTickSource::new(feed.clone(), 0);
        let tick = src.next_tick().await.unwrap();
        assert_eq!(tick.price, 24_010.0);
        let fut = Instrument::new("t", "s");
        let q = feed.leg_quotes(&fut, &fut, &fut).await.unwrap();
        assert_eq!(q.call, Some(108.0));
    }

    #[tokio::test]
    async fn resolution_failures_are_consumed() {
        let feed = SimFeed::new(vec![], NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        feed.fail_next_resolutions(1);
        assert!(feed.resolve_atm("NIFTY 50", 24_000).await.is_err());
        let res = feed.resolve_atm("NIFTY 50", 24_000).await.unwrap();
        assert!(res.complete());
        assert!(res.call.unwrap().symbol.ends_with("24000CE"));
    }
}
