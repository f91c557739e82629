//! Market-data collaborator traits.
//!
//! The engine talks to the broker only through these seams, so live
//! adapters and the scenario simulator are interchangeable under test.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{Instrument, Tick};

/// Option-complex lookup result for one strike. Legs resolve
/// independently upstream, so any of them can come back missing; the
/// engine treats a resolution as usable only when all three are
/// present.
#[derive(Clone, Debug)]
pub struct AtmResolution {
    pub strike: i64,
    pub expiry: NaiveDate,
    pub future: Option<Instrument>,
    pub call: Option<Instrument>,
    pub put: Option<Instrument>,
}

impl AtmResolution {
    pub fn complete(&self) -> bool {
        self.future.is_some() && self.call.is_some() && self.put.is_some()
    }
}

/// Latest traded prices for the linked legs. A `None` leg means the
/// quote fetch for it failed or has not printed this cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct LegQuotes {
    pub future: Option<f64>,
    pub call: Option<f64>,
    pub put: Option<f64>,
}

/// One open-interest sample for the ATM pair.
#[derive(Clone, Copy, Debug)]
pub struct OiSample {
    pub call_oi: f64,
    pub put_oi: f64,
}

/// Resolves the tradable instruments for an ATM strike.
#[async_trait]
pub trait InstrumentResolver: Send + Sync {
    async fn resolve_atm(&self, symbol: &str, strike: i64) -> Result<AtmResolution>;
}

/// Fetches last traded prices for the resolved legs.
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn leg_quotes(
        &self,
        future: &Instrument,
        call: &Instrument,
        put: &Instrument,
    ) -> Result<LegQuotes>;
}

/// Fetches open interest for the ATM option pair.
#[async_trait]
pub trait OiSource: Send + Sync {
    async fn fetch_oi(&self, call: &Instrument, put: &Instrument) -> Result<OiSample>;
}

/// Produces primary-instrument ticks. `None` ends the stream.
#[async_trait]
pub trait TickSource: Send {
    async fn next_tick(&mut self) -> Option<Tick>;
}
