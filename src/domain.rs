// ===============================
// src/domain.rs
// ===============================
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side taken on a venue. For the pair, this is always the Venue A side;
/// Venue B trades the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction { Long, Short }
impl Direction {
    pub fn sign(&self) -> Decimal { match self { Direction::Long => Decimal::ONE, Direction::Short => Decimal::NEGATIVE_ONE } }
    pub fn opposite(&self) -> Direction { match self { Direction::Long => Direction::Short, Direction::Short => Direction::Long } }
    pub fn as_str(&self) -> &'static str { match self { Direction::Long => "long", Direction::Short => "short" } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leg { A, B }

/// Fresh per-cycle snapshot of one venue. `mark_price > 0` for every valid sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VenueState { pub mark_price: Decimal, pub position: Decimal }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent { pub direction: Direction, pub size: Decimal, pub limit_price_hint: Option<Decimal> }

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TradeAction { NoAction, OpenArb(Direction), CloseArb(Direction) }

/// The one decision made per cycle. `size` is the configured trading quantum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision { pub action: TradeAction, pub size: Decimal }
impl TradeDecision {
    /// Venue A direction, if the decision trades at all.
    pub fn direction(&self) -> Option<Direction> {
        match self.action {
            TradeAction::NoAction => None,
            TradeAction::OpenArb(d) | TradeAction::CloseArb(d) => Some(d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryOutcome {
    BelowThreshold { diff: Decimal },
    RiskBlocked { direction: Direction, prospective: Decimal, limit: Decimal },
    Open(Direction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExitOutcome {
    NoPosition,
    NotConverged { diff: Decimal },
    Close(Direction),
}

/// Both rule results plus the single decision derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation { pub entry: EntryOutcome, pub exit: ExitOutcome, pub decision: TradeDecision }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecOutcome {
    Placed { direction: Direction },
    LegFailed { leg: Leg, direction: Direction, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CycleOutcome {
    SampleFailed { venue: String, reason: String },
    NoAction,
    RiskBlocked,
    Executed(ExecOutcome),
}
impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::SampleFailed { .. } => "sample_failed",
            CycleOutcome::NoAction => "no_action",
            CycleOutcome::RiskBlocked => "risk_blocked",
            CycleOutcome::Executed(ExecOutcome::Placed { .. }) => "order_placed",
            CycleOutcome::Executed(ExecOutcome::LegFailed { .. }) => "order_failed",
        }
    }
}

/// What one cycle saw and did. Emitted to the log and, optionally, the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub ts_ns: i128,
    pub seq: u64,
    pub venue_a: Option<VenueState>,
    pub venue_b: Option<VenueState>,
    pub price_diff: Option<Decimal>,
    pub evaluation: Option<Evaluation>,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event { Cycle(CycleReport), Note(String) }

/// `|B - A|` on mark prices.
pub fn price_diff(a: &VenueState, b: &VenueState) -> Decimal {
    (b.mark_price - a.mark_price).abs()
}
