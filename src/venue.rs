// ===============================
// src/venue.rs (adapter contract)
// ===============================
//
// One implementation per venue; the controller only ever sees this trait.
// Adapters own their connection, credentials and precision conversions.
//
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{OrderIntent, VenueState};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("venue not connected")]
    NotConnected,
    #[error("no live quote")]
    NoQuote,
    // produced by wire adapters, not by the paper venue
    #[allow(dead_code)]
    #[error("position query failed: {0}")]
    PositionUnavailable(String),
    #[error("non-positive mark price {0}")]
    InvalidPrice(Decimal),
    #[allow(dead_code)]
    #[error("transport: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("venue not connected")]
    NotConnected,
    #[error("rejected: {0}")]
    Rejected(String),
    #[allow(dead_code)]
    #[error("timed out")]
    Timeout,
    #[error("partial fill {filled} of {requested}")]
    PartialFill { filled: Decimal, requested: Decimal },
    #[error("mark {mark} beyond limit {limit}")]
    LimitBreached { mark: Decimal, limit: Decimal },
    #[allow(dead_code)]
    #[error("transport: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("close failed: {0}")]
    Close(String),
}

/// Long-lived venue handle. `sample_state` must never return a stale or
/// synthetic price; `place_order` is one opaque success/fail unit.
#[async_trait]
pub trait Venue: Send + Sync {
    fn name(&self) -> &str;
    async fn connect(&mut self) -> Result<(), VenueError>;
    async fn sample_state(&self) -> Result<VenueState, SampleError>;
    async fn place_order(&self, intent: &OrderIntent) -> Result<(), OrderError>;
    async fn close(&mut self) -> Result<(), VenueError>;
}
