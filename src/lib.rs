//! Real-time index scalping signal engine.
//!
//! Ticks for the primary index feed candles and momentum indicators;
//! a 1 Hz cycle derives basis, straddle trend, velocity and the fused
//! scalping signal from the current ATM option complex; a slower loop
//! keeps the PCR trap filter live from open interest.

pub mod atm;
pub mod basis;
pub mod candle;
pub mod config;
pub mod engine;
pub mod feed;
pub mod history;
pub mod indicators;
pub mod logging;
pub mod loops;
pub mod pcr;
pub mod retry;
pub mod signal;
pub mod sim;
pub mod straddle;
pub mod types;
pub mod velocity;
