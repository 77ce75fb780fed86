// ===============================
// src/risk.rs
// ===============================
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::Direction;

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("prospective position {prospective} exceeds limit {limit}")]
    PositionLimit { prospective: Decimal, limit: Decimal },
}

/// Pre-trade exposure gate on Venue A. Venue B is sized identically and
/// mirrors A, so only A's own reported position is checked.
///
/// Returns the prospective absolute position when it stays within `limit`.
pub fn check_exposure(
    position: Decimal,
    direction: Direction,
    size: Decimal,
    limit: Decimal,
) -> Result<Decimal, RiskError> {
    let prospective = (position + direction.sign() * size).abs();
    if prospective > limit {
        return Err(RiskError::PositionLimit { prospective, limit });
    }
    Ok(prospective)
}
