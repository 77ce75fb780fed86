// ===============================
// src/execution.rs (paired two-leg placement)
// ===============================
//
// The two legs are NOT atomic: no cross-venue commit exists. A is placed
// and awaited first, then B. A failure on either leg is logged and
// contained here; whatever partially executed stays on the venues and the
// next cycle's sample sees it. There is no unwind step.
//
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::domain::{Direction, ExecOutcome, Leg, OrderIntent, VenueState};
use crate::metrics::ORDERS;
use crate::venue::Venue;

/// Worst acceptable price for Venue B's marketable order. B sells when A
/// goes long, so the bound sits below B's mark; it sits above when B buys.
pub fn price_hint_b(direction_a: Direction, mark_b: Decimal, max_slippage: Decimal) -> Decimal {
    let buffer = Decimal::TWO * max_slippage;
    match direction_a {
        Direction::Long => mark_b - buffer,
        Direction::Short => mark_b + buffer,
    }
}

pub async fn place_pair<A: Venue, B: Venue>(
    venue_a: &A,
    venue_b: &B,
    direction: Direction,
    size: Decimal,
    state_b: &VenueState,
    max_slippage: Decimal,
) -> ExecOutcome {
    let leg_a = OrderIntent { direction, size, limit_price_hint: None };
    let leg_b = OrderIntent {
        direction: direction.opposite(),
        size,
        limit_price_hint: Some(price_hint_b(direction, state_b.mark_price, max_slippage)),
    };

    info!(venue = venue_a.name(), side = direction.as_str(), %size, "placing leg A");
    if let Err(e) = venue_a.place_order(&leg_a).await {
        ORDERS.with_label_values(&[venue_a.name(), "failed"]).inc();
        error!(venue = venue_a.name(), error = %e, "leg A failed, leg B not placed");
        return ExecOutcome::LegFailed { leg: Leg::A, direction, reason: e.to_string() };
    }
    ORDERS.with_label_values(&[venue_a.name(), "ok"]).inc();

    info!(
        venue = venue_b.name(),
        side = leg_b.direction.as_str(),
        %size,
        hint = ?leg_b.limit_price_hint,
        "placing leg B"
    );
    if let Err(e) = venue_b.place_order(&leg_b).await {
        ORDERS.with_label_values(&[venue_b.name(), "failed"]).inc();
        warn!(
            venue = venue_b.name(),
            error = %e,
            unhedged = %(direction.sign() * size),
            "leg B failed after leg A filled; single-leg exposure until next cycle"
        );
        return ExecOutcome::LegFailed { leg: Leg::B, direction, reason: e.to_string() };
    }
    ORDERS.with_label_values(&[venue_b.name(), "ok"]).inc();

    ExecOutcome::Placed { direction }
}
