// ===============================
// src/controller.rs
// ===============================
//
// One cycle = sample both venues concurrently -> one decision -> at most
// one paired execution -> one log record. The controller keeps no
// position ledger; every cycle re-reads the venues.
//
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ArbParams;
use crate::domain::{
    price_diff, CycleOutcome, CycleReport, EntryOutcome, Evaluation, Event, VenueState,
};
use crate::execution::place_pair;
use crate::metrics::{CYCLES, CYCLE_LATENCY, MARK_PRICE, POSITION, PRICE_DIFF, SAMPLE_ERRORS};
use crate::strategy::decide;
use crate::venue::{SampleError, Venue, VenueError};

#[derive(Debug, Error)]
pub enum CycleError {
    /// `venue_a`/`venue_b` carry whichever sample did succeed.
    #[error("sampling {venue} failed: {source}")]
    Sample {
        venue: String,
        source: SampleError,
        venue_a: Option<VenueState>,
        venue_b: Option<VenueState>,
    },
}

pub struct ArbController<A: Venue, B: Venue> {
    venue_a: A,
    venue_b: B,
    params: ArbParams,
    rec_tx: Option<mpsc::Sender<Event>>,
    seq: u64,
}

impl<A: Venue, B: Venue> ArbController<A, B> {
    pub fn new(venue_a: A, venue_b: B, params: ArbParams) -> Self {
        Self { venue_a, venue_b, params, rec_tx: None, seq: 0 }
    }

    pub fn with_recorder(mut self, tx: mpsc::Sender<Event>) -> Self {
        self.rec_tx = Some(tx);
        self
    }

    #[cfg(test)]
    pub fn venue_a(&self) -> &A { &self.venue_a }
    #[cfg(test)]
    pub fn venue_b(&self) -> &B { &self.venue_b }

    pub async fn connect(&mut self) -> Result<(), VenueError> {
        self.venue_a.connect().await?;
        self.venue_b.connect().await?;
        info!(a = self.venue_a.name(), b = self.venue_b.name(), "venues connected");
        Ok(())
    }

    /// Close errors are logged only; there is nothing left to recover at shutdown.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.venue_a.close().await {
            warn!(venue = self.venue_a.name(), error = %e, "close failed");
        }
        if let Err(e) = self.venue_b.close().await {
            warn!(venue = self.venue_b.name(), error = %e, "close failed");
        }
    }

    /// Both samples run concurrently and are joined before any decision.
    /// A non-positive mark price counts as a failed sample.
    pub async fn sample_both(&self) -> Result<(VenueState, VenueState), CycleError> {
        let (ra, rb) = tokio::join!(self.venue_a.sample_state(), self.venue_b.sample_state());
        match (validated(ra), validated(rb)) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Err(source), b) => Err(CycleError::Sample {
                venue: self.venue_a.name().to_string(),
                source,
                venue_a: None,
                venue_b: b.ok(),
            }),
            (Ok(a), Err(source)) => Err(CycleError::Sample {
                venue: self.venue_b.name().to_string(),
                source,
                venue_a: Some(a),
                venue_b: None,
            }),
        }
    }

    pub async fn evaluate_cycle(&mut self) -> CycleReport {
        self.seq += 1;
        let started = Instant::now();

        let report = match self.sample_both().await {
            Err(CycleError::Sample { venue, source, venue_a, venue_b }) => {
                SAMPLE_ERRORS.with_label_values(&[&venue]).inc();
                warn!(seq = self.seq, %venue, error = %source, "sample failed, cycle skipped");
                CycleReport {
                    ts_ns: now_ns(),
                    seq: self.seq,
                    venue_a,
                    venue_b,
                    price_diff: None,
                    evaluation: None,
                    outcome: CycleOutcome::SampleFailed { venue, reason: source.to_string() },
                }
            }
            Ok((a, b)) => self.act(a, b).await,
        };

        CYCLES.with_label_values(&[report.outcome.label()]).inc();
        CYCLE_LATENCY.observe(started.elapsed().as_secs_f64() * 1000.0);
        if let Some(tx) = &self.rec_tx {
            let _ = tx.try_send(Event::Cycle(report.clone()));
        }
        report
    }

    async fn act(&self, a: VenueState, b: VenueState) -> CycleReport {
        let diff = price_diff(&a, &b);
        self.observe(&a, &b, diff);

        let evaluation = decide(&a, &b, &self.params);
        let outcome = match evaluation.decision.direction() {
            None => match &evaluation.entry {
                EntryOutcome::RiskBlocked { direction, prospective, limit } => {
                    info!(side = direction.as_str(), %prospective, %limit, "risk limit, not opening");
                    CycleOutcome::RiskBlocked
                }
                _ => CycleOutcome::NoAction,
            },
            Some(direction) => {
                let exec = place_pair(
                    &self.venue_a,
                    &self.venue_b,
                    direction,
                    evaluation.decision.size,
                    &b,
                    self.params.max_slippage,
                )
                .await;
                CycleOutcome::Executed(exec)
            }
        };

        log_cycle(self.seq, &a, &b, diff, &evaluation, &outcome);

        CycleReport {
            ts_ns: now_ns(),
            seq: self.seq,
            venue_a: Some(a),
            venue_b: Some(b),
            price_diff: Some(diff),
            evaluation: Some(evaluation),
            outcome,
        }
    }

    fn observe(&self, a: &VenueState, b: &VenueState, diff: Decimal) {
        PRICE_DIFF.set(diff.to_f64().unwrap_or(0.0));
        for (name, st) in [(self.venue_a.name(), a), (self.venue_b.name(), b)] {
            MARK_PRICE.with_label_values(&[name]).set(st.mark_price.to_f64().unwrap_or(0.0));
            POSITION.with_label_values(&[name]).set(st.position.to_f64().unwrap_or(0.0));
        }
    }
}

fn validated(r: Result<VenueState, SampleError>) -> Result<VenueState, SampleError> {
    let st = r?;
    if st.mark_price <= Decimal::ZERO {
        return Err(SampleError::InvalidPrice(st.mark_price));
    }
    Ok(st)
}

fn log_cycle(
    seq: u64,
    a: &VenueState,
    b: &VenueState,
    diff: Decimal,
    ev: &Evaluation,
    outcome: &CycleOutcome,
) {
    info!(
        seq,
        mark_a = %a.mark_price,
        mark_b = %b.mark_price,
        pos_a = %a.position,
        pos_b = %b.position,
        price_diff = %diff.round_dp(3),
        net_delta = %(a.position + b.position).abs(),
        entry = ?ev.entry,
        exit = ?ev.exit,
        outcome = outcome.label(),
        "cycle"
    );
}

fn now_ns() -> i128 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0) as i128
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, ExecOutcome, Leg};
    use crate::paper::{PaperCfg, PaperMarket, PaperVenue};
    use crate::venue::testing::ScriptedVenue;
    use crate::venue::OrderError;
    use rust_decimal_macros::dec;

    fn st(mark: Decimal, pos: Decimal) -> VenueState {
        VenueState { mark_price: mark, position: pos }
    }

    fn controller(a: ScriptedVenue, b: ScriptedVenue) -> ArbController<ScriptedVenue, ScriptedVenue> {
        ArbController::new(a, b, ArbParams::default())
    }

    #[tokio::test]
    async fn test_connect_and_shutdown_lifecycle() {
        let mut c = controller(
            ScriptedVenue::steady("A", st(dec!(20), dec!(0))),
            ScriptedVenue::steady("B", st(dec!(20), dec!(0))),
        );
        c.connect().await.unwrap();
        assert!(c.venue_a().connected && c.venue_b().connected);
        c.shutdown().await;
        assert!(c.venue_a().closed && c.venue_b().closed);
    }

    #[tokio::test]
    async fn test_sample_failure_aborts_without_orders() {
        let mut c = controller(
            ScriptedVenue::steady("A", st(dec!(20.00), dec!(0))),
            ScriptedVenue::failing("B"),
        );
        let report = c.evaluate_cycle().await;
        assert!(matches!(report.outcome, CycleOutcome::SampleFailed { ref venue, .. } if venue == "B"));
        assert!(report.evaluation.is_none());
        // A's good sample is still reported
        assert_eq!(report.venue_a, Some(st(dec!(20.00), dec!(0))));
        assert_eq!(report.venue_b, None);
        assert!(c.venue_a().placed().is_empty());
        assert!(c.venue_b().placed().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_mark_aborts_cycle() {
        let mut c = controller(
            ScriptedVenue::steady("A", st(dec!(0), dec!(0))),
            ScriptedVenue::steady("B", st(dec!(20.10), dec!(0))),
        );
        let report = c.evaluate_cycle().await;
        match report.outcome {
            CycleOutcome::SampleFailed { venue, reason } => {
                assert_eq!(venue, "A");
                assert!(reason.contains("non-positive"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(report.venue_a, None);
        assert_eq!(report.venue_b, Some(st(dec!(20.10), dec!(0))));
        assert!(c.venue_b().placed().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_then_shutdown_closes_first_venue() {
        let cfg = PaperCfg { spread: dec!(0), latency_ms: 0, reject_rate: 0.0, max_fill: dec!(10), price_dp: 3 };
        let a = PaperVenue::new("A", PaperMarket::new(dec!(20), dec!(0)), cfg.clone());
        let b = PaperVenue::new("B", PaperMarket::new(dec!(0), dec!(0)), cfg);
        let mut c = ArbController::new(a, b, ArbParams::default());

        assert!(matches!(c.connect().await, Err(VenueError::Connect(_))));
        assert!(c.venue_a().sample_state().await.is_ok());

        c.shutdown().await;
        assert!(matches!(c.venue_a().sample_state().await, Err(SampleError::NotConnected)));
    }

    #[tokio::test]
    async fn test_paper_pair_leg_b_never_breaches_its_own_hint() {
        // default paper settings, risk limit out of the way so every signal trades
        let market = PaperMarket::new(dec!(100), dec!(0.01));
        let cfg = |spread| PaperCfg { spread, latency_ms: 0, reject_rate: 0.0, max_fill: dec!(10), price_dp: 3 };
        let a = PaperVenue::new("A", market.clone(), cfg(dec!(0.02)));
        let b = PaperVenue::new("B", market, cfg(dec!(0.08)));
        let params = ArbParams { risk_threshold: dec!(1000000), ..ArbParams::default() };
        let mut c = ArbController::new(a, b, params);
        c.connect().await.unwrap();

        let mut executed = 0;
        for _ in 0..500 {
            match c.evaluate_cycle().await.outcome {
                CycleOutcome::Executed(ExecOutcome::Placed { .. }) => executed += 1,
                CycleOutcome::Executed(failed) => panic!("leg failed: {failed:?}"),
                _ => {}
            }
        }
        assert!(executed > 0);
    }

    #[tokio::test]
    async fn test_open_places_both_legs() {
        let mut c = controller(
            ScriptedVenue::steady("A", st(dec!(20.00), dec!(0))),
            ScriptedVenue::steady("B", st(dec!(20.10), dec!(0))),
        );
        let report = c.evaluate_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Executed(ExecOutcome::Placed { direction: Direction::Long }));
        assert_eq!(report.price_diff, Some(dec!(0.10)));
        assert_eq!(c.venue_a().placed()[0].direction, Direction::Long);
        assert_eq!(c.venue_b().placed()[0].direction, Direction::Short);
        assert_eq!(c.venue_b().placed()[0].limit_price_hint, Some(dec!(20.04)));
    }

    #[tokio::test]
    async fn test_risk_blocked_places_nothing() {
        let mut c = controller(
            ScriptedVenue::steady("A", st(dec!(20.00), dec!(1.0))),
            ScriptedVenue::steady("B", st(dec!(20.10), dec!(-1.0))),
        );
        let report = c.evaluate_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::RiskBlocked);
        assert!(c.venue_a().placed().is_empty());
        assert!(c.venue_b().placed().is_empty());
    }

    #[tokio::test]
    async fn test_close_uses_fixed_quantum() {
        let mut c = controller(
            ScriptedVenue::steady("A", st(dec!(20.00), dec!(-0.5))),
            ScriptedVenue::steady("B", st(dec!(20.01), dec!(0.5))),
        );
        let report = c.evaluate_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Executed(ExecOutcome::Placed { direction: Direction::Long }));
        let leg_a = &c.venue_a().placed()[0];
        assert_eq!(leg_a.direction, Direction::Long);
        assert_eq!(leg_a.size, dec!(1));
        // B sells its long, no lower than mark - 2 * slippage
        let leg_b = &c.venue_b().placed()[0];
        assert_eq!(leg_b.direction, Direction::Short);
        assert_eq!(leg_b.limit_price_hint, Some(dec!(19.95)));
    }

    #[tokio::test]
    async fn test_leg_b_failure_does_not_stop_next_cycle() {
        let a = ScriptedVenue::steady("A", st(dec!(20.00), dec!(0)));
        let b = ScriptedVenue::steady("B", st(dec!(20.10), dec!(0)));
        b.push_order_result(Err(OrderError::Rejected("post-only".into())));
        let mut c = controller(a, b);

        let first = c.evaluate_cycle().await;
        assert!(matches!(first.outcome, CycleOutcome::Executed(ExecOutcome::LegFailed { leg: Leg::B, .. })));

        let second = c.evaluate_cycle().await;
        assert_eq!(second.seq, 2);
        assert_eq!(second.outcome, CycleOutcome::Executed(ExecOutcome::Placed { direction: Direction::Long }));
    }

    #[tokio::test]
    async fn test_unchanged_in_threshold_state_never_acts() {
        let mut c = controller(
            ScriptedVenue::steady("A", st(dec!(20.00), dec!(0))),
            ScriptedVenue::steady("B", st(dec!(20.03), dec!(0))),
        );
        for _ in 0..50 {
            assert_eq!(c.evaluate_cycle().await.outcome, CycleOutcome::NoAction);
        }
        assert!(c.venue_a().placed().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_report_sent_to_recorder() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut c = controller(
            ScriptedVenue::steady("A", st(dec!(20.00), dec!(0))),
            ScriptedVenue::steady("B", st(dec!(20.00), dec!(0))),
        )
        .with_recorder(tx);
        c.evaluate_cycle().await;
        match rx.recv().await {
            Some(Event::Cycle(r)) => assert_eq!(r.outcome, CycleOutcome::NoAction),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
