// ===============================
// src/main.rs
// ===============================
/*
 # run two paper venues, one cycle every 2s, record cycles
 POLL_INTERVAL_SECS=2 RECORD_FILE=data/cycles.jsonl cargo run --release

 # watch the controller
 curl -s localhost:9898/metrics | egrep '^arb_(cycles_total|price_diff|position)'
*/
/*
=============================================================================
Project : mark_arb_bot — cross-venue mark-price arbitrage controller in Rust
Module  : main.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Samples mark price + position on two venues every cycle, opens an
          offsetting pair when prices diverge, unwinds when they converge,
          bounded by a per-venue exposure limit. Exposes Prometheus metrics
          and records JSONL cycle events.
=============================================================================
*/
mod config;
mod controller;
mod domain;
mod execution;
mod metrics;
mod paper;            // simulated venue adapter
mod recorder;
mod risk;
mod strategy;
mod venue;

use rust_decimal::prelude::ToPrimitive;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::controller::ArbController;
use crate::domain::Event;
use crate::paper::{PaperCfg, PaperMarket, PaperVenue};
use crate::venue::Venue;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Load config ----
    let (args, params) = match config::load() {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    info!(
        min_entry = %params.min_entry_threshold,
        max_exit = %params.max_exit_threshold,
        risk = %params.risk_threshold,
        slippage = %params.max_slippage,
        amount = %params.trading_amount,
        poll_secs = args.poll_interval_secs,
        "startup config"
    );
    if params.thresholds_overlap() {
        warn!("exit threshold above entry threshold: entry and exit can both signal on one sample");
    }

    // ---- Metrics ----
    metrics::init();
    for (name, v) in params.named() {
        metrics::CONFIG_PARAM.with_label_values(&[name]).set(v.to_f64().unwrap_or(0.0));
    }
    if let Err(e) = metrics::serve_metrics(args.metrics_port) {
        warn!(error = %e, port = args.metrics_port, "metrics server not started");
    }

    // ---- Recorder (optional) ----
    let mut rec_tx: Option<mpsc::Sender<Event>> = None;
    let mut rec_handle = None;
    if let Some(path) = args.record_file.clone() {
        let (tx, rx) = mpsc::channel::<Event>(1024);
        rec_handle = Some(tokio::spawn(recorder::run(rx, path)));
        let _ = tx.try_send(Event::Note(format!("startup {params:?}")));
        rec_tx = Some(tx);
    }

    // ---- Venues ----
    let market = PaperMarket::new(args.paper_start_price, args.paper_step);
    let venue_cfg = |spread| PaperCfg {
        spread,
        latency_ms: args.paper_latency_ms,
        reject_rate: args.paper_reject_rate,
        max_fill: args.paper_max_fill,
        price_dp: 3,
    };
    let venue_a = PaperVenue::new("A", market.clone(), venue_cfg(args.paper_spread_a));
    let venue_b = PaperVenue::new("B", market, venue_cfg(args.paper_spread_b));

    let mut ctl = ArbController::new(venue_a, venue_b, params);
    if let Some(tx) = rec_tx {
        ctl = ctl.with_recorder(tx);
    }
    if let Err(e) = ctl.connect().await {
        error!(error = %e, "venue connect failed");
        // venue A may already be up; close it and flush the recorder first
        stop(ctl, rec_handle).await;
        std::process::exit(1);
    }

    // ---- Polling loop ----
    // Each cycle is awaited to completion before the next tick is taken,
    // so cycles never overlap; late ticks are delayed, not bunched.
    let mut tick = interval(Duration::from_secs(args.poll_interval_secs));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycles: u64 = 0;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                ctl.evaluate_cycle().await;
                cycles += 1;
                if args.max_cycles > 0 && cycles >= args.max_cycles {
                    info!(cycles, "max cycles reached");
                    break;
                }
            }
            _ = &mut shutdown => {
                info!(cycles, "ctrl-c, shutting down");
                break;
            }
        }
    }

    stop(ctl, rec_handle).await;
}

async fn stop<A: Venue, B: Venue>(mut ctl: ArbController<A, B>, rec_handle: Option<JoinHandle<()>>) {
    ctl.shutdown().await;

    // closing the last sender lets the recorder flush and exit
    drop(ctl);
    if let Some(h) = rec_handle {
        let _ = h.await;
    }
}
