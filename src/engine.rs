//! The scalping engine: all mutable state behind one type.
//!
//! Two lock groups split the hot paths. `primary` holds everything the
//! tick stream touches (candles, indicators, tick tape) and `scalp`
//! holds the per-cycle derived state (ATM complex, basis, straddle,
//! velocity, PCR, signal, history). A cycle copies what it needs out
//! of one group, does its network fetches unlocked, then computes and
//! publishes under the other. No guard is ever held across an await.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::atm::{resolution_trigger, AtmState, AtmTrigger};
use crate::basis::BasisEngine;
use crate::candle::CandleAggregator;
use crate::config::Config;
use crate::feed::{InstrumentResolver, LegQuotes, OiSource, PriceFetcher};
use crate::history::{HistoryBuffer, HistoryEntry};
use crate::indicators::{ema, rsi};
use crate::logging::{
    log, log_atm_resolved, log_candle, log_cycle_metrics, log_pcr, log_signal_change, obj,
    state_hash, v_num, v_str, Domain, Level,
};
use crate::pcr::PcrState;
use crate::signal::{apply_late_session, decide, is_late_session, Decision, SignalInputs,
    SpotTrendGauge};
use crate::straddle::StraddleTrendEngine;
use crate::types::{round2, InstrumentRole, ScalpSignal, Sentiment, StraddleTrend};
use crate::velocity::VelocityEngine;

pub const STATUS_LIVE: &str = "LIVE";
pub const STATUS_WAITING_SPOT: &str = "Waiting for Spot Price...";
pub const STATUS_AWAITING_DATA: &str = "Tokens found, awaiting data...";
pub const STATUS_NO_TOKENS: &str = "No tokens available";

/// One cached leg price with a per-cycle freshness flag. The cache
/// value survives across cycles for display, the flag does not.
#[derive(Clone, Copy, Debug, Default)]
struct LegSlot {
    price: Option<f64>,
    fresh: bool,
}

impl LegSlot {
    fn set(&mut self, price: f64) {
        self.price = Some(price);
        self.fresh = true;
    }

    fn fresh_price(&self) -> Option<f64> {
        if self.fresh {
            self.price
        } else {
            None
        }
    }
}

/// One row of the primary-instrument tick tape.
#[derive(Clone, Debug, Serialize)]
pub struct TickEntry {
    pub time: String,
    pub price: f64,
    pub change: f64,
}

/// State owned by the tick path.
struct PrimaryState {
    candles: CandleAggregator,
    spot: Option<f64>,
    total_ticks: u64,
    tick_tape: VecDeque<TickEntry>,
    rsi: Option<f64>,
    ema: Option<f64>,
}

/// State owned by the scalping cycle.
struct ScalpState {
    atm: Option<AtmState>,
    future: LegSlot,
    call: LegSlot,
    put: LegSlot,
    basis: BasisEngine,
    straddle: StraddleTrendEngine,
    velocity: VelocityEngine,
    pcr: PcrState,
    gauge: SpotTrendGauge,
    history: HistoryBuffer,
    status: String,
    decision: Decision,
    last_logged_signal: Option<ScalpSignal>,
    // Last cycle's published readings, for the snapshot.
    real_basis: Option<f64>,
    legacy_basis: Option<f64>,
    sentiment: Sentiment,
    sentiment_score: f64,
    straddle_price: Option<f64>,
    straddle_sma3: Option<f64>,
    straddle_trend: StraddleTrend,
    velocity_value: f64,
    latency_ms: f64,
    smoothed_latency_ms: f64,
}

/// Everything external consumers see, produced under both locks in one
/// synchronous read.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub status: String,
    pub spot: Option<f64>,
    pub total_ticks: u64,
    pub candles_count: usize,
    pub rsi: Option<f64>,
    pub ema: Option<f64>,
    pub tick_history: Vec<TickEntry>,
    pub future_price: Option<f64>,
    pub ce_price: Option<f64>,
    pub pe_price: Option<f64>,
    pub basis: Option<f64>,
    pub real_basis: Option<f64>,
    pub straddle_price: Option<f64>,
    pub sma3: Option<f64>,
    pub trend: StraddleTrend,
    pub sentiment: Sentiment,
    pub signal: ScalpSignal,
    pub suggestion: String,
    pub is_trap: bool,
    pub pcr: f64,
    pub pcr_age: u64,
    pub atm_strike: Option<i64>,
    pub ce_symbol: Option<String>,
    pub pe_symbol: Option<String>,
    pub velocity: f64,
    pub latency_ms: i64,
}

/// Collaborators a cycle needs. Borrowed so the sim and live adapters
/// can share one instance across loops.
pub struct CycleFeeds<'a> {
    pub resolver: &'a dyn InstrumentResolver,
    pub fetcher: &'a dyn PriceFetcher,
}

pub struct ScalpEngine {
    cfg: Config,
    primary: Mutex<PrimaryState>,
    scalp: Mutex<ScalpState>,
}

impl ScalpEngine {
    pub fn new(cfg: Config, now_ms: u64) -> Self {
        let primary = PrimaryState {
            candles: CandleAggregator::new(cfg.candle_secs, cfg.candle_window),
            spot: None,
            total_ticks: 0,
            tick_tape: VecDeque::with_capacity(cfg.tick_tape_cap),
            rsi: None,
            ema: None,
        };
        let scalp = ScalpState {
            atm: None,
            future: LegSlot::default(),
            call: LegSlot::default(),
            put: LegSlot::default(),
            basis: BasisEngine::new(),
            straddle: StraddleTrendEngine::new(),
            velocity: VelocityEngine::new(),
            pcr: PcrState::new(now_ms),
            gauge: SpotTrendGauge::new(),
            history: HistoryBuffer::new(cfg.history_cap),
            status: STATUS_WAITING_SPOT.to_string(),
            decision: Decision {
                signal: ScalpSignal::Wait,
                suggestion: "Waiting for Setup...".to_string(),
                is_trap: false,
            },
            last_logged_signal: None,
            real_basis: None,
            legacy_basis: None,
            sentiment: Sentiment::Neutral,
            sentiment_score: 0.0,
            straddle_price: None,
            straddle_sma3: None,
            straddle_trend: StraddleTrend::Flat,
            velocity_value: 0.0,
            latency_ms: 0.0,
            smoothed_latency_ms: 0.0,
        };
        Self { cfg, primary: Mutex::new(primary), scalp: Mutex::new(scalp) }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Classify a raw broker token against the current instrument map.
    pub fn role_for_token(&self, token: &str) -> Option<InstrumentRole> {
        if token == self.cfg.spot_token {
            return Some(InstrumentRole::Spot);
        }
        let scalp = self.scalp.lock().expect("scalp lock");
        let atm = scalp.atm.as_ref()?;
        if token == atm.future.token {
            Some(InstrumentRole::Future)
        } else if token == atm.call.token {
            Some(InstrumentRole::Call)
        } else if token == atm.put.token {
            Some(InstrumentRole::Put)
        } else {
            None
        }
    }

    /// Ingest a tick from the stream. Unknown tokens are dropped.
    pub fn on_raw_tick(&self, token: &str, price: f64, ts_ms: u64) {
        if let Some(role) = self.role_for_token(token) {
            self.on_tick(role, price, ts_ms);
        }
    }

    pub fn on_tick(&self, role: InstrumentRole, price: f64, ts_ms: u64) {
        match role {
            InstrumentRole::Spot => self.on_spot_tick(price, ts_ms),
            InstrumentRole::Future => {
                self.scalp.lock().expect("scalp lock").future.set(price);
            }
            InstrumentRole::Call => {
                self.scalp.lock().expect("scalp lock").call.set(price);
            }
            InstrumentRole::Put => {
                self.scalp.lock().expect("scalp lock").put.set(price);
            }
        }
    }

    fn on_spot_tick(&self, price: f64, ts_ms: u64) {
        let closed = {
            let mut primary = self.primary.lock().expect("primary lock");
            primary.spot = Some(price);
            primary.total_ticks += 1;
            let change = primary.tick_tape.back().map(|e| price - e.price).unwrap_or(0.0);
            if primary.tick_tape.len() == self.cfg.tick_tape_cap {
                primary.tick_tape.pop_front();
            }
            let time = chrono::DateTime::from_timestamp_millis(ts_ms as i64)
                .map(|dt| dt.format("%I:%M:%S %p").to_string())
                .unwrap_or_default();
            primary.tick_tape.push_back(TickEntry { time, price, change });

            let closed = primary.candles.update(price, ts_ms);
            let closes = primary.candles.closes();
            primary.rsi = rsi(&closes, self.cfg.rsi_period);
            primary.ema = ema(&closes, self.cfg.ema_period);
            closed
        };
        // Sink writes stay outside the lock; a stalled sink must not
        // hold up the tick path.
        if let Some(c) = closed {
            log_candle(&self.cfg.symbol, c.start_secs, c.open, c.high, c.low, c.close);
        }
    }

    /// Apply one open-interest sample from the slow poll loop.
    pub fn update_oi(&self, call_oi: f64, put_oi: f64, now_ms: u64) {
        let mut scalp = self.scalp.lock().expect("scalp lock");
        if scalp.pcr.apply(call_oi, put_oi, now_ms) {
            let pcr = scalp.pcr.value;
            // Extreme OI skew flags the published state as a trap
            // until the next cycle re-evaluates it.
            if scalp.pcr.is_extreme() {
                scalp.decision.is_trap = true;
            }
            drop(scalp);
            log_pcr(pcr, call_oi, put_oi);
        } else {
            drop(scalp);
            log(
                Level::Warn,
                Domain::Oi,
                "oi_rejected",
                obj(&[("call_oi", v_num(call_oi)), ("put_oi", v_num(put_oi))]),
            );
        }
    }

    /// Startup path: error out unless an ATM complex is held after one
    /// resolution attempt, so callers can wrap it in a bounded retry.
    pub async fn ensure_atm(&self, feeds: &CycleFeeds<'_>, now: NaiveDateTime) -> Result<()> {
        let spot = {
            let primary = self.primary.lock().expect("primary lock");
            primary.spot
        };
        let Some(spot) = spot else {
            anyhow::bail!("no spot price yet");
        };
        self.maybe_resolve_atm(feeds, spot, now).await;
        if self.atm_strike().is_none() {
            anyhow::bail!("atm resolution failed");
        }
        Ok(())
    }

    /// One scalping cycle at the given wall-clock instant. Network
    /// calls (resolution, quotes) happen between lock scopes.
    pub async fn run_cycle_at(&self, feeds: &CycleFeeds<'_>, now: NaiveDateTime) -> Result<()> {
        let started = std::time::Instant::now();

        let spot = {
            let primary = self.primary.lock().expect("primary lock");
            primary.spot
        };
        let Some(spot) = spot else {
            let mut scalp = self.scalp.lock().expect("scalp lock");
            scalp.status = STATUS_WAITING_SPOT.to_string();
            return Ok(());
        };

        self.maybe_resolve_atm(feeds, spot, now).await;

        // Quote fetch for the resolved legs, off the lock.
        let atm = {
            let scalp = self.scalp.lock().expect("scalp lock");
            scalp.atm.clone()
        };
        let quotes = match &atm {
            Some(state) => {
                match feeds.fetcher.leg_quotes(&state.future, &state.call, &state.put).await {
                    Ok(q) => Some(q),
                    Err(err) => {
                        log(
                            Level::Warn,
                            Domain::Scalp,
                            "quote_fetch_failed",
                            obj(&[("error", v_str(&err.to_string()))]),
                        );
                        None
                    }
                }
            }
            None => None,
        };

        self.compute_cycle(spot, atm.as_ref(), quotes, now);

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let (smoothed, velocity) = {
            let mut scalp = self.scalp.lock().expect("scalp lock");
            scalp.latency_ms = latency_ms;
            scalp.smoothed_latency_ms = if scalp.smoothed_latency_ms == 0.0 {
                latency_ms
            } else {
                scalp.smoothed_latency_ms * 0.7 + latency_ms * 0.3
            };
            (scalp.smoothed_latency_ms, scalp.velocity_value)
        };
        log_cycle_metrics(latency_ms, smoothed, spot, velocity);
        Ok(())
    }

    /// Re-resolve the ATM complex when the tracker fires. A failed or
    /// incomplete resolution keeps the previous state working.
    async fn maybe_resolve_atm(&self, feeds: &CycleFeeds<'_>, spot: f64, now: NaiveDateTime) {
        let today = now.date();
        let trigger = {
            let scalp = self.scalp.lock().expect("scalp lock");
            resolution_trigger(scalp.atm.as_ref(), spot, today)
        };
        let Some((trigger, strike)) = trigger else {
            return;
        };

        let resolution = match feeds.resolver.resolve_atm(&self.cfg.symbol, strike).await {
            Ok(r) => r,
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Atm,
                    "resolution_failed",
                    obj(&[
                        ("trigger", v_str(trigger.as_str())),
                        ("strike", serde_json::json!(strike)),
                        ("error", v_str(&err.to_string())),
                    ]),
                );
                return;
            }
        };
        let (Some(future), Some(call), Some(put)) =
            (resolution.future, resolution.call, resolution.put)
        else {
            log(
                Level::Warn,
                Domain::Atm,
                "resolution_incomplete",
                obj(&[
                    ("trigger", v_str(trigger.as_str())),
                    ("strike", serde_json::json!(strike)),
                ]),
            );
            return;
        };

        let next = AtmState {
            strike: resolution.strike,
            expiry: resolution.expiry,
            resolved_on: today,
            future,
            call,
            put,
        };
        let call_symbol = next.call.symbol.clone();
        {
            let mut scalp = self.scalp.lock().expect("scalp lock");
            scalp.atm = Some(next);
            // Old-strike premiums must not bleed into the new complex.
            if trigger != AtmTrigger::Initial {
                scalp.basis.clear();
                scalp.straddle.clear_window();
                scalp.future = LegSlot::default();
                scalp.call = LegSlot::default();
                scalp.put = LegSlot::default();
            }
        }
        log_atm_resolved(
            trigger.as_str(),
            resolution.strike,
            &resolution.expiry.to_string(),
            &call_symbol,
        );
    }

    /// The synchronous heart of the cycle: everything derived from the
    /// cached prices, computed and published under one lock.
    fn compute_cycle(
        &self,
        spot: f64,
        atm: Option<&AtmState>,
        quotes: Option<LegQuotes>,
        now: NaiveDateTime,
    ) {
        let mut scalp = self.scalp.lock().expect("scalp lock");

        if let Some(q) = quotes {
            if let Some(p) = q.future {
                scalp.future.set(p);
            }
            if let Some(p) = q.call {
                scalp.call.set(p);
            }
            if let Some(p) = q.put {
                scalp.put.set(p);
            }
        }

        // The decision sees the raw velocity; rounding is display-only
        // so a marginal move does not stall at the entry gate.
        let velocity = scalp.velocity.update(spot);
        scalp.velocity_value = round2(velocity);

        let fresh_call = scalp.call.fresh_price();
        let fresh_put = scalp.put.fresh_price();
        let fresh_future = scalp.future.fresh_price();

        // Basis runs fresh-only; a filled premium would fabricate
        // sentiment out of stale data.
        match (atm, fresh_call, fresh_put) {
            (Some(state), Some(call), Some(put)) => {
                let reading = scalp.basis.update(state.strike as f64, call, put, spot);
                scalp.real_basis = Some(reading.real_basis);
                scalp.sentiment = reading.sentiment;
                scalp.sentiment_score = reading.score;
            }
            _ => {
                scalp.real_basis = None;
                scalp.sentiment = Sentiment::Neutral;
                scalp.sentiment_score = 0.0;
            }
        }
        scalp.legacy_basis = fresh_future.map(|f| round2(f - spot));

        let legs = fresh_call.zip(fresh_put);
        let straddle = scalp.straddle.update(legs);
        scalp.straddle_price = straddle.price;
        scalp.straddle_sma3 = straddle.sma3;
        scalp.straddle_trend = straddle.trend;

        let mut decision = decide(SignalInputs {
            velocity,
            pcr: scalp.pcr.value,
            real_basis: scalp.real_basis,
            sentiment_score: scalp.sentiment_score,
        });
        // The gauge only sees spots inside the guard window; its mean
        // then reflects late-session prices only.
        if is_late_session(now.time()) {
            let trend = scalp.gauge.observe(spot);
            apply_late_session(&mut decision, trend, now.time());
        }

        let has_data = scalp.future.price.is_some()
            || scalp.call.price.is_some()
            || scalp.straddle_price.is_some();
        scalp.status = if has_data {
            STATUS_LIVE.to_string()
        } else if atm.is_some() {
            STATUS_AWAITING_DATA.to_string()
        } else {
            STATUS_NO_TOKENS.to_string()
        };

        // Log transitions only, and only for actionable states; a WAIT
        // re-arms the logger for the next trade signal.
        let mut signal_change = None;
        if Some(decision.signal) != scalp.last_logged_signal {
            if decision.signal.is_actionable() {
                signal_change =
                    Some((decision.signal, decision.suggestion.clone(), scalp.pcr.value));
                scalp.last_logged_signal = Some(decision.signal);
            } else if decision.signal == ScalpSignal::Wait {
                scalp.last_logged_signal = Some(ScalpSignal::Wait);
            }
        }

        let entry = HistoryEntry {
            time: now.format("%I:%M:%S %p").to_string(),
            spot,
            future: scalp.future.price,
            basis: scalp.legacy_basis,
            real_basis: scalp.real_basis,
            ce: scalp.call.price,
            pe: scalp.put.price,
            straddle: scalp.straddle_price,
            sma3: scalp.straddle_sma3,
            trend: scalp.straddle_trend,
            sentiment: scalp.sentiment,
            signal: decision.signal,
        };
        scalp.history.push(entry);
        scalp.decision = decision;

        // Freshness is per-cycle; cached prices stay for display.
        scalp.future.fresh = false;
        scalp.call.fresh = false;
        scalp.put.fresh = false;

        let cycle_signal = scalp.decision.signal;
        drop(scalp);

        // Sink writes run off the lock; readers never wait on I/O.
        if let Some((signal, suggestion, pcr)) = signal_change {
            let hash =
                state_hash(&format!("{}|{}|{:.2}|{:.2}", signal, suggestion, spot, pcr));
            log_signal_change(&signal.to_string(), &suggestion, spot, pcr, &hash);
        }

        let hm = now.hour() * 100 + now.minute();
        log(
            Level::Trace,
            Domain::Scalp,
            "cycle",
            obj(&[
                ("spot", v_num(spot)),
                ("hm", serde_json::json!(hm)),
                ("signal", v_str(&cycle_signal.to_string())),
            ]),
        );
    }

    /// Lock-protected, side-effect-free read of the full state.
    pub fn snapshot(&self) -> Snapshot {
        let primary = self.primary.lock().expect("primary lock");
        let scalp = self.scalp.lock().expect("scalp lock");
        Snapshot {
            status: scalp.status.clone(),
            spot: primary.spot,
            total_ticks: primary.total_ticks,
            candles_count: primary.candles.closed().len(),
            rsi: primary.rsi,
            ema: primary.ema,
            tick_history: primary.tick_tape.iter().cloned().collect(),
            future_price: scalp.future.price,
            ce_price: scalp.call.price,
            pe_price: scalp.put.price,
            basis: scalp.legacy_basis,
            real_basis: scalp.real_basis,
            straddle_price: scalp.straddle_price,
            sma3: scalp.straddle_sma3,
            trend: scalp.straddle_trend,
            sentiment: scalp.sentiment,
            signal: scalp.decision.signal,
            suggestion: scalp.decision.suggestion.clone(),
            is_trap: scalp.decision.is_trap,
            pcr: scalp.pcr.value,
            pcr_age: scalp.pcr.age_secs(crate::logging::ts_epoch_ms()),
            atm_strike: scalp.atm.as_ref().map(|a| a.strike),
            ce_symbol: scalp.atm.as_ref().map(|a| a.call.symbol.clone()),
            pe_symbol: scalp.atm.as_ref().map(|a| a.put.symbol.clone()),
            velocity: scalp.velocity_value,
            latency_ms: scalp.smoothed_latency_ms as i64,
        }
    }

    /// Last `n` history rows, insertion order.
    pub fn history(&self, n: usize) -> Vec<HistoryEntry> {
        let scalp = self.scalp.lock().expect("scalp lock");
        scalp.history.last_n(n)
    }

    pub fn atm_strike(&self) -> Option<i64> {
        let scalp = self.scalp.lock().expect("scalp lock");
        scalp.atm.as_ref().map(|a| a.strike)
    }
}

/// Drive one OI sample through the source into the engine.
pub async fn poll_oi_once(engine: &ScalpEngine, source: &dyn OiSource, now_ms: u64) -> Result<()> {
    let atm = {
        let scalp = engine.scalp.lock().expect("scalp lock");
        scalp.atm.clone()
    };
    let Some(atm) = atm else {
        return Ok(());
    };
    let sample = source.fetch_oi(&atm.call, &atm.put).await?;
    engine.update_oi(sample.call_oi, sample.put_oi, now_ms);
    Ok(())
}
