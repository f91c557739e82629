//! The three concurrent loops: tick ingestion, the 1 Hz scalping
//! cycle, and the slow open-interest poll.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Local;
use tokio::time::sleep;

use crate::engine::{poll_oi_once, CycleFeeds, ScalpEngine};
use crate::feed::{InstrumentResolver, OiSource, PriceFetcher, TickSource};
use crate::logging::{log, obj, ts_epoch_ms, v_str, Domain, Level};
use crate::retry::{retry_async, RetryConfig};

/// Drain the tick source into the engine. Returns when the stream
/// ends.
pub async fn run_tick_loop(engine: Arc<ScalpEngine>, mut source: impl TickSource) {
    while let Some(tick) = source.next_tick().await {
        engine.on_tick(tick.role, tick.price, tick.ts_ms);
    }
    log(Level::Info, Domain::System, "tick_stream_ended", obj(&[]));
}

/// Bounded-backoff startup: wait for the first spot print, then
/// resolve the initial ATM complex or give up.
pub async fn bootstrap_atm(
    engine: &ScalpEngine,
    resolver: &Arc<dyn InstrumentResolver>,
    fetcher: &Arc<dyn PriceFetcher>,
) -> Result<()> {
    let feeds = CycleFeeds { resolver: resolver.as_ref(), fetcher: fetcher.as_ref() };
    let config = RetryConfig::setup(engine.config().setup_max_retries);
    retry_async(&config, "atm_setup", || {
        engine.ensure_atm(&feeds, Local::now().naive_local())
    })
    .await
}

/// The scalping cycle at the configured cadence. Sleeps only the
/// remainder of the interval after each cycle, with a floor so a slow
/// cycle cannot starve the runtime.
pub async fn run_scalp_loop(
    engine: Arc<ScalpEngine>,
    resolver: Arc<dyn InstrumentResolver>,
    fetcher: Arc<dyn PriceFetcher>,
) {
    let interval = engine.config().poll_interval;
    let floor = engine.config().poll_floor;
    loop {
        let started = Instant::now();
        let feeds = CycleFeeds { resolver: resolver.as_ref(), fetcher: fetcher.as_ref() };
        if let Err(err) = engine.run_cycle_at(&feeds, Local::now().naive_local()).await {
            log(
                Level::Error,
                Domain::System,
                "cycle_failed",
                obj(&[("error", v_str(&err.to_string()))]),
            );
        }
        let remainder = interval.saturating_sub(started.elapsed());
        sleep(remainder.max(floor)).await;
    }
}

/// Slow loop feeding the PCR from live open interest.
pub async fn run_oi_loop(engine: Arc<ScalpEngine>, source: Arc<dyn OiSource>) {
    let interval = engine.config().oi_poll_interval;
    loop {
        if let Err(err) = poll_oi_once(&engine, source.as_ref(), ts_epoch_ms()).await {
            log(
                Level::Warn,
                Domain::Oi,
                "oi_poll_failed",
                obj(&[("error", v_str(&err.to_string()))]),
            );
        }
        sleep(interval).await;
    }
}
