//! Market-data feed: advances each configured symbol's walk at ~4 Hz and
//! fans the tick batch out to `/marketdata` subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use blotter_bus::EventBus;
use blotter_core::time::utc_now_iso;
use blotter_core::types::MarketTick;
use blotter_sim::MarketSim;

/// Background worker publishing per-symbol price ticks.
pub struct MarketDataFeed {
    market: Arc<MarketSim>,
    bus: Arc<EventBus>,
    symbols: Vec<String>,
    interval: Duration,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MarketDataFeed {
    pub fn new(
        market: Arc<MarketSim>,
        bus: Arc<EventBus>,
        symbols: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            market,
            bus,
            symbols,
            interval,
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Build one tick batch, advancing every symbol's walk.
    pub fn tick_batch(&self) -> Vec<MarketTick> {
        let timestamp = utc_now_iso();
        self.symbols
            .iter()
            .map(|symbol| MarketTick {
                symbol: symbol.clone(),
                price: (self.market.next_tick(symbol) * 100.0).round() / 100.0,
                timestamp: timestamp.clone(),
            })
            .collect()
    }

    /// Start the worker thread. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("md-feed".into())
            .spawn(move || {
                tracing::info!(
                    symbols = ?this.symbols,
                    interval_ms = this.interval.as_millis() as u64,
                    "market data feed started"
                );
                while this.running.load(Ordering::SeqCst) {
                    std::thread::sleep(this.interval);
                    if !this.running.load(Ordering::SeqCst) {
                        break;
                    }

                    let batch = this.tick_batch();
                    match serde_json::to_string(&batch) {
                        Ok(payload) => this.bus.market_data.publish(&payload),
                        Err(e) => tracing::error!(error = %e, "tick batch serialization failed"),
                    }
                }
                tracing::info!("market data feed stopped");
            })
            .expect("failed to spawn market data feed thread");

        *self.worker.lock() = Some(handle);
    }

    /// Stop and join the worker.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_feed(symbols: &[&str]) -> (Arc<MarketDataFeed>, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let feed = Arc::new(MarketDataFeed::new(
            Arc::new(MarketSim::with_seed(42)),
            Arc::clone(&bus),
            symbols.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(50),
        ));
        (feed, bus)
    }

    #[test]
    fn test_tick_batch_covers_all_symbols() {
        let (feed, _bus) = make_feed(&["AAPL", "MSFT", "TSLA"]);
        let batch = feed.tick_batch();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].symbol, "AAPL");
        assert_eq!(batch[2].symbol, "TSLA");
        for tick in &batch {
            assert!(tick.price > 0.0);
            // Rounded to cents.
            let cents = tick.price * 100.0;
            assert!((cents - cents.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ticks_advance_the_walk() {
        let (feed, _bus) = make_feed(&["AAPL"]);
        let a = feed.tick_batch()[0].price;
        let b = feed.tick_batch()[0].price;
        // Two successive ticks virtually never coincide after cent
        // rounding of a ~190-dollar walk, but equality is not a bug;
        // assert only that prices stay positive and the walk ran.
        assert!(a > 0.0 && b > 0.0);
    }

    #[test]
    fn test_worker_publishes_batches() {
        let (feed, bus) = make_feed(&["AAPL", "MSFT"]);
        let sub = bus.market_data.subscribe();

        feed.start();
        let payload = sub.recv_timeout(Duration::from_secs(5));
        feed.stop();

        let payload = payload.expect("feed should publish");
        let batch: Vec<MarketTick> = serde_json::from_str(&payload).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].symbol, "AAPL");
        assert_eq!(batch[1].symbol, "MSFT");
    }
}
