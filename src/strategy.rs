// ===============================
// src/strategy.rs
// ===============================
//
// Entry/exit rules on one sampled (A, B) pair. Pure functions, no I/O:
// the same inputs always give the same decision, nothing carries over
// between cycles.
//
// Hysteresis:
//   - open  when |B - A| >= min_entry_threshold (buy the cheaper venue)
//   - close when |B - A| <  max_exit_threshold and A holds a position
//
use rust_decimal::Decimal;
use tracing::warn;

use crate::config::ArbParams;
use crate::domain::{
    price_diff, Direction, EntryOutcome, Evaluation, ExitOutcome, TradeAction, TradeDecision,
    VenueState,
};
use crate::risk::{check_exposure, RiskError};

pub fn attempt_open(a: &VenueState, b: &VenueState, p: &ArbParams) -> EntryOutcome {
    let diff = price_diff(a, b);
    if diff < p.min_entry_threshold {
        return EntryOutcome::BelowThreshold { diff };
    }

    // B lebih mahal -> beli di A, jual di B
    let direction = if b.mark_price > a.mark_price { Direction::Long } else { Direction::Short };

    match check_exposure(a.position, direction, p.trading_amount, p.risk_threshold) {
        Ok(_) => EntryOutcome::Open(direction),
        Err(RiskError::PositionLimit { prospective, limit }) => {
            EntryOutcome::RiskBlocked { direction, prospective, limit }
        }
    }
}

/// Unwinds one trading quantum against A's held position. Partial closes
/// accumulate toward flat over successive cycles.
pub fn attempt_close(a: &VenueState, b: &VenueState, p: &ArbParams) -> ExitOutcome {
    if a.position.is_zero() {
        return ExitOutcome::NoPosition;
    }
    let diff = price_diff(a, b);
    if diff >= p.max_exit_threshold {
        return ExitOutcome::NotConverged { diff };
    }
    let direction = if a.position > Decimal::ZERO { Direction::Short } else { Direction::Long };
    ExitOutcome::Close(direction)
}

/// Evaluates both rules and picks exactly one action. Entry takes
/// precedence; exit only acts when entry produced no signal.
pub fn decide(a: &VenueState, b: &VenueState, p: &ArbParams) -> Evaluation {
    let entry = attempt_open(a, b, p);
    let exit = attempt_close(a, b, p);

    let action = match (&entry, &exit) {
        (EntryOutcome::Open(open), ExitOutcome::Close(close)) => {
            warn!(open = open.as_str(), close = close.as_str(), "entry and exit both signalled; entry wins");
            TradeAction::OpenArb(*open)
        }
        (EntryOutcome::Open(d), _) => TradeAction::OpenArb(*d),
        (_, ExitOutcome::Close(d)) => TradeAction::CloseArb(*d),
        _ => TradeAction::NoAction,
    };

    Evaluation { entry, exit, decision: TradeDecision { action, size: p.trading_amount } }
}
