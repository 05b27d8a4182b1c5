//! Per-symbol random-walk price model with fill arbitration.
//!
//! All operations run under a single simulator-wide lock: every draw from
//! the RNG happens with the lock held, so the random stream (and therefore
//! every price path) is fully determined by the seed and the sequence of
//! calls.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};

use blotter_core::types::{BookLevel, Side, SyntheticBook};

/// Seed prices for well-known tickers; anything else starts at the
/// configured default.
const SEED_PRICES: &[(&str, f64)] = &[
    ("AAPL", 189.95),
    ("GOOGL", 141.80),
    ("MSFT", 415.30),
    ("NVDA", 118.60),
    ("TSLA", 248.50),
    ("AMZN", 186.40),
];

/// Minimum representable price; the walk is floored here.
const PRICE_FLOOR: f64 = 0.01;

/// Quantity below which a favorable order fills completely.
const FULL_FILL_QTY: i64 = 100;

/// Result of a fill attempt against the simulated market.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FillResult {
    /// Quantity filled; zero means no fill.
    pub fill_qty: i64,
    /// Price at which the fill occurred.
    pub fill_px: f64,
    /// `true` when the fill consumed all remaining quantity.
    pub complete: bool,
}

struct Inner {
    rng: StdRng,
    /// Current `last` price per symbol, created lazily on first mention.
    last: HashMap<String, f64>,
}

/// Seeded per-symbol random-walk market simulator.
pub struct MarketSim {
    start_price: f64,
    step: f64,
    normal: Normal<f64>,
    /// Fill 20-100% of remaining quantity.
    fill_ratio: Uniform<f64>,
    /// Random quantity for synthetic book levels.
    level_qty: Uniform<i64>,
    /// Half-spread as a fraction of mid.
    half_spread: Uniform<f64>,
    inner: Mutex<Inner>,
}

impl MarketSim {
    /// Create a simulator with the given seed and walk parameters.
    pub fn new(seed: u64, start_price: f64, step: f64) -> Self {
        Self {
            start_price,
            step,
            normal: Normal::new(0.0, 1.0).expect("valid normal distribution"),
            fill_ratio: Uniform::new(0.2, 1.0),
            level_qty: Uniform::new_inclusive(50, 500),
            half_spread: Uniform::new(0.001, 0.0025),
            inner: Mutex::new(Inner {
                rng: StdRng::seed_from_u64(seed),
                last: HashMap::new(),
            }),
        }
    }

    /// Simulator with the default start price (100.0) and step (0.05).
    pub fn with_seed(seed: u64) -> Self {
        Self::new(seed, 100.0, 0.05)
    }

    fn seed_price(&self, symbol: &str) -> f64 {
        SEED_PRICES
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, px)| *px)
            .unwrap_or(self.start_price)
    }

    /// Current mark for `symbol`, creating its state at the seed price on
    /// first mention. Does not consume randomness.
    pub fn mark(&self, symbol: &str) -> f64 {
        let mut inner = self.inner.lock();
        let seed = self.seed_price(symbol);
        *inner.last.entry(symbol.to_string()).or_insert(seed)
    }

    /// Advance the walk one step and return the new `last`.
    pub fn next_tick(&self, symbol: &str) -> f64 {
        let mut inner = self.inner.lock();
        self.next_tick_locked(&mut inner, symbol)
    }

    // Must be called with the lock held; consumes one normal draw.
    fn next_tick_locked(&self, inner: &mut Inner, symbol: &str) -> f64 {
        let seed = self.seed_price(symbol);
        let last = inner.last.entry(symbol.to_string()).or_insert(seed);
        let eps = self.normal.sample(&mut inner.rng);
        *last += eps * self.step * (*last / 100.0);
        if *last < PRICE_FLOOR {
            *last = PRICE_FLOOR;
        }
        *last
    }

    /// Advance the tick and report whether a limit order at `limit_px`
    /// would fill: Buy fills at or below the limit, Sell at or above.
    pub fn should_fill(&self, symbol: &str, side: Side, limit_px: f64) -> bool {
        let mut inner = self.inner.lock();
        let px = self.next_tick_locked(&mut inner, symbol);
        match side {
            Side::Buy => px <= limit_px,
            Side::Sell => px >= limit_px,
        }
    }

    /// Advance the tick and arbitrate a fill for an open order.
    ///
    /// Small remainders (<= 100) fill completely when the price is
    /// favorable; larger ones fill a uniform 20-100% slice, at least one
    /// share, capped at the remainder.
    pub fn attempt_fill(
        &self,
        symbol: &str,
        side: Side,
        limit_px: f64,
        leaves_qty: i64,
    ) -> FillResult {
        let mut inner = self.inner.lock();

        if leaves_qty <= 0 {
            return FillResult::default();
        }

        let px = self.next_tick_locked(&mut inner, symbol);
        let favorable = match side {
            Side::Buy => px <= limit_px,
            Side::Sell => px >= limit_px,
        };
        if !favorable {
            return FillResult::default();
        }

        let mut fill_qty = if leaves_qty <= FULL_FILL_QTY {
            leaves_qty
        } else {
            let ratio = self.fill_ratio.sample(&mut inner.rng);
            ((leaves_qty as f64 * ratio) as i64).max(1)
        };
        fill_qty = fill_qty.min(leaves_qty);

        FillResult {
            fill_qty,
            fill_px: px,
            complete: fill_qty == leaves_qty,
        }
    }

    /// Synthesize a two-sided book around the current mark.
    ///
    /// Bid level `i` sits at `round2((mid - half) - i*2*step)`, asks
    /// symmetrically above. Levels are rounded to cents; the best bid is
    /// kept strictly below the best ask even when rounding would collapse
    /// the spread.
    pub fn order_book(&self, symbol: &str, depth: usize) -> SyntheticBook {
        let mut inner = self.inner.lock();

        let seed = self.seed_price(symbol);
        let mut mid = *inner.last.entry(symbol.to_string()).or_insert(seed);
        if mid <= PRICE_FLOOR {
            mid = seed;
        }

        let half = mid * self.half_spread.sample(&mut inner.rng);
        let bid_start = round2(mid - half);
        let mut ask_start = round2(mid + half);
        if ask_start <= bid_start {
            ask_start = bid_start + 0.01;
        }

        let mut bids = Vec::with_capacity(depth);
        for i in 0..depth {
            let price = round2(bid_start - i as f64 * 2.0 * self.step);
            let quantity = inner.rng.sample(self.level_qty);
            if price > 0.0 {
                bids.push(BookLevel { price, quantity });
            }
        }

        let mut asks = Vec::with_capacity(depth);
        for i in 0..depth {
            let price = round2(ask_start + i as f64 * 2.0 * self.step);
            let quantity = inner.rng.sample(self.level_qty);
            asks.push(BookLevel { price, quantity });
        }

        SyntheticBook {
            symbol: symbol.to_string(),
            bids,
            asks,
            last_price: mid,
            spread: half * 2.0,
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Property: determinism ──

    #[test]
    fn test_same_seed_same_ticks() {
        let a = MarketSim::new(999, 100.0, 0.05);
        let b = MarketSim::new(999, 100.0, 0.05);

        let ticks_a: Vec<f64> = (0..10).map(|_| a.next_tick("X")).collect();
        let ticks_b: Vec<f64> = (0..10).map(|_| b.next_tick("X")).collect();

        // Bitwise identical.
        for (x, y) in ticks_a.iter().zip(&ticks_b) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_same_seed_same_mixed_call_sequence() {
        let a = MarketSim::with_seed(7);
        let b = MarketSim::with_seed(7);

        for sim in [&a, &b] {
            let _ = sim.mark("AAPL");
            let _ = sim.next_tick("AAPL");
            let _ = sim.attempt_fill("AAPL", Side::Buy, 1_000.0, 5_000);
            let _ = sim.order_book("AAPL", 5);
        }

        assert_eq!(a.mark("AAPL").to_bits(), b.mark("AAPL").to_bits());
        assert_eq!(
            a.next_tick("AAPL").to_bits(),
            b.next_tick("AAPL").to_bits()
        );
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = MarketSim::with_seed(1);
        let b = MarketSim::with_seed(2);
        let ticks_a: Vec<f64> = (0..5).map(|_| a.next_tick("X")).collect();
        let ticks_b: Vec<f64> = (0..5).map(|_| b.next_tick("X")).collect();
        assert_ne!(ticks_a, ticks_b);
    }

    #[test]
    fn test_mark_unknown_ticker_uses_default() {
        let sim = MarketSim::with_seed(42);
        assert_eq!(sim.mark("UNKNOWN_TICKER"), 100.0);
    }

    #[test]
    fn test_mark_known_ticker_uses_seed_price() {
        let sim = MarketSim::with_seed(42);
        assert!(sim.mark("AAPL") > 100.0);
        assert_eq!(sim.mark("MSFT"), 415.30);
    }

    #[test]
    fn test_mark_does_not_consume_randomness() {
        let a = MarketSim::with_seed(5);
        let b = MarketSim::with_seed(5);
        for _ in 0..3 {
            let _ = a.mark("X");
        }
        assert_eq!(a.next_tick("X").to_bits(), b.next_tick("X").to_bits());
    }

    #[test]
    fn test_symbols_are_independent() {
        let sim = MarketSim::with_seed(42);
        assert_eq!(sim.mark("SYM1"), 100.0);
        assert_eq!(sim.mark("SYM2"), 100.0);

        sim.next_tick("SYM1");
        sim.next_tick("SYM1");
        sim.next_tick("SYM1");

        assert_eq!(sim.mark("SYM2"), 100.0);
        assert_ne!(sim.mark("SYM1"), 100.0);
    }

    #[test]
    fn test_ticks_stay_positive() {
        let sim = MarketSim::new(42, 0.02, 5.0); // violent walk near the floor
        for _ in 0..200 {
            assert!(sim.next_tick("T") >= PRICE_FLOOR);
        }
    }

    #[test]
    fn test_buy_fill_logic() {
        let sim = MarketSim::new(123, 100.0, 0.01);
        // A limit far below the market can never fill a buy.
        assert!(!sim.should_fill("LOW", Side::Buy, 1.0));
        // A limit far above always fills a buy.
        assert!(sim.should_fill("HIGH", Side::Buy, 10_000.0));
    }

    #[test]
    fn test_sell_fill_logic() {
        let sim = MarketSim::new(456, 100.0, 0.01);
        assert!(sim.should_fill("SELL_LOW", Side::Sell, 1.0));
        assert!(!sim.should_fill("SELL_HIGH", Side::Sell, 10_000.0));
    }

    #[test]
    fn test_small_order_fills_completely() {
        let sim = MarketSim::new(789, 100.0, 0.01);
        let result = sim.attempt_fill("SMALL", Side::Buy, 150.0, 50);
        assert_eq!(result.fill_qty, 50);
        assert!(result.complete);
        assert!(result.fill_px > 0.0);
    }

    #[test]
    fn test_large_order_fill_bounds() {
        let sim = MarketSim::new(101, 100.0, 0.01);
        for _ in 0..20 {
            let result = sim.attempt_fill("LARGE", Side::Buy, 200.0, 5_000);
            assert!(result.fill_qty >= 1);
            assert!(result.fill_qty <= 5_000);
            assert_eq!(result.complete, result.fill_qty == 5_000);
        }
    }

    #[test]
    fn test_no_fill_on_zero_leaves() {
        let sim = MarketSim::with_seed(42);
        let result = sim.attempt_fill("ZERO", Side::Buy, 200.0, 0);
        assert_eq!(result, FillResult::default());
    }

    #[test]
    fn test_no_fill_when_price_unfavorable() {
        let sim = MarketSim::new(42, 100.0, 0.01);
        let result = sim.attempt_fill("UNFAV", Side::Buy, 1.0, 500);
        assert_eq!(result.fill_qty, 0);
        assert!(!result.complete);
    }

    // ── Property: book ordering ──

    #[test]
    fn test_book_ordering() {
        let sim = MarketSim::with_seed(42);
        for symbol in ["AAPL", "UNKNOWN", "TSLA"] {
            let book = sim.order_book(symbol, 5);
            assert_eq!(book.bids.len(), 5);
            assert_eq!(book.asks.len(), 5);

            for w in book.bids.windows(2) {
                assert!(w[0].price >= w[1].price);
            }
            for w in book.asks.windows(2) {
                assert!(w[0].price <= w[1].price);
            }
            assert!(book.bids[0].price < book.asks[0].price);
        }
    }

    #[test]
    fn test_book_level_quantities_in_range() {
        let sim = MarketSim::with_seed(42);
        let book = sim.order_book("AAPL", 5);
        for level in book.bids.iter().chain(book.asks.iter()) {
            assert!(level.quantity >= 50 && level.quantity <= 500);
        }
    }

    #[test]
    fn test_book_spread_strictly_positive_near_floor() {
        let sim = MarketSim::new(42, 0.02, 0.0001);
        // Walk the price down to the floor, then ask for a book.
        for _ in 0..50 {
            sim.next_tick("PENNY");
        }
        let book = sim.order_book("PENNY", 3);
        assert!(book.bids[0].price < book.asks[0].price);
    }

    #[test]
    fn test_book_prices_rounded_to_cents() {
        let sim = MarketSim::with_seed(42);
        let book = sim.order_book("AAPL", 5);
        for level in book.bids.iter().chain(book.asks.iter()) {
            let cents = level.price * 100.0;
            assert!((cents - cents.round()).abs() < 1e-9);
        }
    }
}
