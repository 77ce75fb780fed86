// ===============================
// src/paper.rs (simulated venue)
// ===============================
//
// Paper-trading adapter: both venues quote around one shared reference
// price (random walk). Each venue adds its own quote offset, which persists
// between calls and mean-reverts, so the pair drifts apart and back
// together over several cycles. Each venue keeps its own position book;
// that book is the position truth the controller samples.
//
// Only sampling moves prices. An order is checked against the venue's
// current quote, i.e. the same mark the last sample returned unless the
// shared mid moved in between.
//
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::domain::{Direction, OrderIntent, VenueState};
use crate::venue::{OrderError, SampleError, Venue, VenueError};

/// Share of the previous offset kept on each sample.
const OFFSET_KEEP: Decimal = dec!(0.8);
/// Largest fresh offset innovation, as a share of `spread`.
const OFFSET_SHOCK: Decimal = dec!(0.5);

/// Random draw in [-1, 1] with 3 decimals.
fn unit_noise() -> Decimal {
    Decimal::new(rand::thread_rng().gen_range(-1000..=1000), 3)
}

#[derive(Debug)]
pub struct PaperMarket {
    mid: Mutex<Decimal>,
    step: Decimal,
}

impl PaperMarket {
    pub fn new(start: Decimal, step: Decimal) -> Arc<Self> {
        Arc::new(Self { mid: Mutex::new(start), step })
    }

    /// Advances the walk by at most `step` and returns the new mid.
    fn advance(&self) -> Decimal {
        let mut mid = self.mid.lock().unwrap_or_else(|p| p.into_inner());
        *mid += self.step * unit_noise();
        *mid
    }

    fn current(&self) -> Decimal {
        *self.mid.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Clone)]
pub struct PaperCfg {
    /// Bound on the venue's quote offset from the reference mid.
    pub spread: Decimal,
    pub latency_ms: u64,
    pub reject_rate: f64,
    /// Largest quantity one order can fill; the rest comes back as a partial fill.
    pub max_fill: Decimal,
    /// Price decimals the venue accepts on limit hints.
    pub price_dp: u32,
}

#[derive(Debug, Default)]
struct Book {
    position: Decimal,
    offset: Decimal,
}

pub struct PaperVenue {
    name: String,
    market: Arc<PaperMarket>,
    cfg: PaperCfg,
    connected: bool,
    book: Mutex<Book>,
}

impl PaperVenue {
    pub fn new(name: impl Into<String>, market: Arc<PaperMarket>, cfg: PaperCfg) -> Self {
        Self { name: name.into(), market, cfg, connected: false, book: Mutex::new(Book::default()) }
    }

    fn book(&self) -> std::sync::MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Moves the market and this venue's offset, then quotes.
    fn requote(&self) -> Option<VenueState> {
        let mid = self.market.advance();
        let mut book = self.book();
        let spread = self.cfg.spread;
        book.offset = (book.offset * OFFSET_KEEP + spread * OFFSET_SHOCK * unit_noise())
            .round_dp(6)
            .clamp(-spread, spread);
        let mark = mid + book.offset;
        (mark > Decimal::ZERO).then_some(VenueState { mark_price: mark, position: book.position })
    }

    fn check_limit(&self, intent: &OrderIntent, mark: Decimal) -> Result<(), OrderError> {
        let Some(hint) = intent.limit_price_hint else { return Ok(()) };
        let limit = hint.round_dp(self.cfg.price_dp);
        let breached = match intent.direction {
            Direction::Long => mark > limit,
            Direction::Short => mark < limit,
        };
        if breached {
            return Err(OrderError::LimitBreached { mark, limit });
        }
        Ok(())
    }
}

#[async_trait]
impl Venue for PaperVenue {
    fn name(&self) -> &str { &self.name }

    async fn connect(&mut self) -> Result<(), VenueError> {
        let mid = self.market.current();
        if mid <= Decimal::ZERO {
            return Err(VenueError::Connect(format!("no reference price ({mid})")));
        }
        self.connected = true;
        info!(venue = %self.name, %mid, "paper venue connected");
        Ok(())
    }

    async fn sample_state(&self) -> Result<VenueState, SampleError> {
        if !self.connected {
            return Err(SampleError::NotConnected);
        }
        self.requote().ok_or(SampleError::NoQuote)
    }

    async fn place_order(&self, intent: &OrderIntent) -> Result<(), OrderError> {
        if !self.connected {
            return Err(OrderError::NotConnected);
        }
        sleep(Duration::from_millis(self.cfg.latency_ms)).await;

        // jangan simpan ThreadRng melewati .await
        if rand::thread_rng().gen_bool(self.cfg.reject_rate) {
            return Err(OrderError::Rejected("paper reject".into()));
        }

        let mut book = self.book();
        let mark = self.market.current() + book.offset;
        if mark <= Decimal::ZERO {
            return Err(OrderError::Rejected("no liquidity".into()));
        }
        self.check_limit(intent, mark)?;

        let filled = intent.size.min(self.cfg.max_fill);
        book.position += intent.direction.sign() * filled;
        debug!(venue = %self.name, side = intent.direction.as_str(), %filled, %mark, position = %book.position, "paper fill");
        if filled < intent.size {
            return Err(OrderError::PartialFill { filled, requested: intent.size });
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), VenueError> {
        if !self.connected {
            return Err(VenueError::Close("not connected".into()));
        }
        self.connected = false;
        info!(venue = %self.name, position = %self.book().position, "paper venue closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(spread: Decimal) -> PaperCfg {
        PaperCfg { spread, latency_ms: 0, reject_rate: 0.0, max_fill: dec!(10), price_dp: 3 }
    }

    fn still_venue(name: &str, mid: Decimal) -> PaperVenue {
        PaperVenue::new(name, PaperMarket::new(mid, dec!(0)), cfg(dec!(0)))
    }

    #[tokio::test]
    async fn test_sample_requires_connect() {
        let v = still_venue("A", dec!(20));
        assert!(matches!(v.sample_state().await, Err(SampleError::NotConnected)));
        let intent = OrderIntent { direction: Direction::Long, size: dec!(1), limit_price_hint: None };
        assert!(matches!(v.place_order(&intent).await, Err(OrderError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_fails_without_reference_price() {
        let mut v = still_venue("A", dec!(0));
        assert!(matches!(v.connect().await, Err(VenueError::Connect(_))));
        assert!(matches!(v.close().await, Err(VenueError::Close(_))));
    }

    #[tokio::test]
    async fn test_fills_update_position_book() {
        let mut v = still_venue("A", dec!(20));
        v.connect().await.unwrap();

        let buy = OrderIntent { direction: Direction::Long, size: dec!(1), limit_price_hint: None };
        let sell = OrderIntent { direction: Direction::Short, size: dec!(0.5), limit_price_hint: None };
        v.place_order(&buy).await.unwrap();
        v.place_order(&sell).await.unwrap();

        let st = v.sample_state().await.unwrap();
        assert_eq!(st.mark_price, dec!(20));
        assert_eq!(st.position, dec!(0.5));
    }

    #[tokio::test]
    async fn test_limit_hint_enforced() {
        let mut v = still_venue("B", dec!(20));
        v.connect().await.unwrap();

        let buy_too_low = OrderIntent { direction: Direction::Long, size: dec!(1), limit_price_hint: Some(dec!(19.94)) };
        assert!(matches!(v.place_order(&buy_too_low).await, Err(OrderError::LimitBreached { .. })));

        let sell_ok = OrderIntent { direction: Direction::Short, size: dec!(1), limit_price_hint: Some(dec!(19.94)) };
        v.place_order(&sell_ok).await.unwrap();
        assert_eq!(v.sample_state().await.unwrap().position, dec!(-1));
    }

    #[tokio::test]
    async fn test_hinted_order_right_after_sample_fills() {
        // wide offset, still mid: the order sees the quote the sample returned
        let mut v = PaperVenue::new("B", PaperMarket::new(dec!(100), dec!(0)), cfg(dec!(0.08)));
        v.connect().await.unwrap();

        for _ in 0..200 {
            let st = v.sample_state().await.unwrap();
            let sell = OrderIntent { direction: Direction::Short, size: dec!(1), limit_price_hint: Some(st.mark_price - dec!(0.06)) };
            v.place_order(&sell).await.unwrap();
            let st = v.sample_state().await.unwrap();
            let buy = OrderIntent { direction: Direction::Long, size: dec!(1), limit_price_hint: Some(st.mark_price + dec!(0.06)) };
            v.place_order(&buy).await.unwrap();
        }
        assert_eq!(v.sample_state().await.unwrap().position, dec!(0));
    }

    #[tokio::test]
    async fn test_offset_stays_within_spread() {
        let mut v = PaperVenue::new("B", PaperMarket::new(dec!(100), dec!(0)), cfg(dec!(0.08)));
        v.connect().await.unwrap();
        for _ in 0..500 {
            let mark = v.sample_state().await.unwrap().mark_price;
            assert!((mark - dec!(100)).abs() <= dec!(0.08), "mark {mark} outside spread");
        }
    }

    #[tokio::test]
    async fn test_order_above_max_fill_is_partial() {
        let market = PaperMarket::new(dec!(20), dec!(0));
        let mut v = PaperVenue::new("A", market, PaperCfg { max_fill: dec!(0.4), ..cfg(dec!(0)) });
        v.connect().await.unwrap();

        let buy = OrderIntent { direction: Direction::Long, size: dec!(1), limit_price_hint: None };
        match v.place_order(&buy).await {
            Err(OrderError::PartialFill { filled, requested }) => {
                assert_eq!(filled, dec!(0.4));
                assert_eq!(requested, dec!(1));
            }
            other => panic!("unexpected result {other:?}"),
        }
        // the filled part stays on the book
        assert_eq!(v.sample_state().await.unwrap().position, dec!(0.4));
    }

    #[tokio::test]
    async fn test_reject_rate_one_always_rejects() {
        let market = PaperMarket::new(dec!(20), dec!(0));
        let mut v = PaperVenue::new("A", market, PaperCfg { reject_rate: 1.0, ..cfg(dec!(0)) });
        v.connect().await.unwrap();
        let intent = OrderIntent { direction: Direction::Long, size: dec!(1), limit_price_hint: None };
        assert!(matches!(v.place_order(&intent).await, Err(OrderError::Rejected(_))));
        assert_eq!(v.sample_state().await.unwrap().position, dec!(0));
    }

    #[tokio::test]
    async fn test_non_positive_mark_yields_no_quote() {
        let market = PaperMarket::new(dec!(20), dec!(0));
        let mut v = PaperVenue::new("A", market.clone(), cfg(dec!(0)));
        v.connect().await.unwrap();
        *market.mid.lock().unwrap() = dec!(0);
        assert!(matches!(v.sample_state().await, Err(SampleError::NoQuote)));
    }
}
