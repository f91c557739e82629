use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use serde_json::json;

use niftyscalp::config::Config;
use niftyscalp::engine::ScalpEngine;
use niftyscalp::feed::{InstrumentResolver, OiSource, PriceFetcher};
use niftyscalp::logging::{log, obj, ts_epoch_ms, v_str, Domain, Level};
use niftyscalp::loops::{bootstrap_atm, run_oi_loop, run_scalp_loop, run_tick_loop};
use niftyscalp::sim::{scenario_ticks, Scenario, SimFeed, SimTickSource};

/// Scenario playback runner. The broker session is out of scope here;
/// the sim feed stands in behind the same traits a live adapter would
/// implement.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let scenario = std::env::args()
        .nth(1)
        .and_then(|s| Scenario::parse(&s))
        .unwrap_or(Scenario::BullRun);
    let ticks: usize = std::env::var("SIM_TICKS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("symbol", v_str(&cfg.symbol)),
            ("scenario", v_str(&format!("{scenario:?}"))),
            ("ticks", json!(ticks)),
        ]),
    );

    let engine = Arc::new(ScalpEngine::new(cfg.clone(), ts_epoch_ms()));
    let feed = Arc::new(SimFeed::new(
        scenario_ticks(scenario, ticks),
        Local::now().date_naive(),
    ));
    let resolver: Arc<dyn InstrumentResolver> = feed.clone();
    let fetcher: Arc<dyn PriceFetcher> = feed.clone();
    let oi_source: Arc<dyn OiSource> = feed.clone();

    let source = SimTickSource::paced(feed.clone(), ts_epoch_ms(), cfg.poll_interval);
    let tick_task = tokio::spawn(run_tick_loop(engine.clone(), source));

    bootstrap_atm(engine.as_ref(), &resolver, &fetcher).await?;

    let scalp_task = tokio::spawn(run_scalp_loop(
        engine.clone(),
        resolver.clone(),
        fetcher.clone(),
    ));
    let oi_task = tokio::spawn(run_oi_loop(engine.clone(), oi_source));

    // The sim stream is finite; when it drains, publish the final
    // state and shut down.
    tick_task.await?;
    // One more cycle so the last tick is reflected in the snapshot.
    tokio::time::sleep(cfg.poll_interval + cfg.poll_floor).await;
    scalp_task.abort();
    oi_task.abort();

    let snapshot = engine.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    for entry in engine.history(10) {
        println!("{}", serde_json::to_string(&entry)?);
    }
    log(
        Level::Info,
        Domain::System,
        "shutdown",
        obj(&[("signal", v_str(&snapshot.signal.to_string()))]),
    );
    Ok(())
}
