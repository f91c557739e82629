use std::collections::VecDeque;

/// One fixed-period OHLC bucket keyed by its aligned start second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candle {
    /// Bucket start, unix seconds aligned to the candle period.
    pub start_secs: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    fn seed(start_secs: i64, price: f64) -> Self {
        Self { start_secs, open: price, high: price, low: price, close: price }
    }

    fn absorb(&mut self, price: f64) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
    }
}

/// Builds fixed-period candles from an unordered spot tick stream and
/// keeps a bounded window of closed ones for indicator computation.
///
/// A tick whose bucket precedes the current one is still folded into
/// the live candle: late data nudges the current close, accepted as a
/// small inaccuracy rather than rewriting closed history.
pub struct CandleAggregator {
    period_secs: i64,
    window: usize,
    closed: VecDeque<Candle>,
    live: Option<Candle>,
}

impl CandleAggregator {
    pub fn new(period_secs: i64, window: usize) -> Self {
        assert!(period_secs > 0);
        Self { period_secs, window, closed: VecDeque::with_capacity(window), live: None }
    }

    fn bucket(&self, ts_ms: u64) -> i64 {
        let secs = (ts_ms / 1000) as i64;
        secs - secs.rem_euclid(self.period_secs)
    }

    /// Feed one spot tick. Returns the candle that closed, if this tick
    /// rolled the live bucket forward.
    pub fn update(&mut self, price: f64, ts_ms: u64) -> Option<Candle> {
        let bucket = self.bucket(ts_ms);
        match self.live {
            None => {
                self.live = Some(Candle::seed(bucket, price));
                None
            }
            Some(ref mut live) if bucket == live.start_secs => {
                live.absorb(price);
                None
            }
            Some(live) if bucket > live.start_secs => {
                self.push_closed(live);
                self.live = Some(Candle::seed(bucket, price));
                Some(live)
            }
            Some(ref mut live) => {
                // Late tick for an already-closed bucket: folded into
                // the current candle rather than rewriting history.
                live.absorb(price);
                None
            }
        }
    }

    fn push_closed(&mut self, candle: Candle) {
        if self.closed.len() == self.window {
            self.closed.pop_front();
        }
        self.closed.push_back(candle);
    }

    /// Closed candles oldest-first. The live bucket is excluded.
    pub fn closed(&self) -> &VecDeque<Candle> {
        &self.closed
    }

    /// Close series oldest-first, ending with the live candle's
    /// running close so indicators move within the current period.
    pub fn closes(&self) -> Vec<f64> {
        let mut closes: Vec<f64> = self.closed.iter().map(|c| c.close).collect();
        if let Some(live) = &self.live {
            closes.push(live.close);
        }
        closes
    }

    pub fn live(&self) -> Option<&Candle> {
        self.live.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(secs: u64) -> u64 {
        secs * 1000
    }

    #[test]
    fn ticks_within_one_minute_form_one_bucket() {
        let mut agg = CandleAggregator::new(60, 10);
        assert!(agg.update(100.0, ms(0)).is_none());
        assert!(agg.update(103.0, ms(20)).is_none());
        assert!(agg.update(99.0, ms(59)).is_none());
        let live = agg.live().unwrap();
        assert_eq!(live.open, 100.0);
        assert_eq!(live.high, 103.0);
        assert_eq!(live.low, 99.0);
        assert_eq!(live.close, 99.0);
        assert!(agg.closed().is_empty());
    }

    #[test]
    fn minute_rollover_closes_candle() {
        let mut agg = CandleAggregator::new(60, 10);
        agg.update(100.0, ms(10));
        agg.update(101.0, ms(50));
        let closed = agg.update(105.0, ms(60)).unwrap();
        assert_eq!(closed.start_secs, 0);
        assert_eq!(closed.close, 101.0);
        assert_eq!(agg.closed().len(), 1);
        assert_eq!(agg.live().unwrap().open, 105.0);
    }

    #[test]
    fn window_is_bounded() {
        let mut agg = CandleAggregator::new(60, 3);
        for i in 0..6u64 {
            agg.update(100.0 + i as f64, ms(i * 60));
        }
        assert_eq!(agg.closed().len(), 3);
        assert_eq!(agg.closed().front().unwrap().start_secs, 120);
    }

    #[test]
    fn late_tick_folds_into_current_candle() {
        let mut agg = CandleAggregator::new(60, 10);
        agg.update(100.0, ms(10));
        agg.update(105.0, ms(70));
        // Tick stamped inside the already-closed first minute.
        assert!(agg.update(120.0, ms(30)).is_none());
        // Closed history is untouched; the live candle absorbs it.
        let first = agg.closed().front().unwrap();
        assert_eq!(first.high, 100.0);
        assert_eq!(first.close, 100.0);
        let live = agg.live().unwrap();
        assert_eq!(live.high, 120.0);
        assert_eq!(live.close, 120.0);
    }

    #[test]
    fn close_series_tracks_the_live_candle() {
        let mut agg = CandleAggregator::new(60, 10);
        agg.update(100.0, ms(10));
        agg.update(105.0, ms(70));
        assert_eq!(agg.closes(), vec![100.0, 105.0]);
        agg.update(107.0, ms(80));
        assert_eq!(agg.closes(), vec![100.0, 107.0]);
    }

    #[test]
    fn skipped_minutes_close_only_one_candle() {
        let mut agg = CandleAggregator::new(60, 10);
        agg.update(100.0, ms(0));
        let closed = agg.update(110.0, ms(300)).unwrap();
        assert_eq!(closed.start_secs, 0);
        assert_eq!(agg.closed().len(), 1);
        assert_eq!(agg.live().unwrap().start_secs, 300);
    }
}
