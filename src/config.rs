// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : mark_arb_bot — cross-venue mark-price arbitrage controller in Rust
Module  : config.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Samples mark price + position on two venues every cycle, opens an
          offsetting pair when prices diverge, unwinds when they converge,
          bounded by a per-venue exposure limit. Exposes Prometheus metrics
          and records JSONL cycle events.
=============================================================================
*/
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Flags fall back to the environment (and `.env`, loaded in `load()`).
#[derive(Parser, Clone, Debug)]
#[command(name = "mark_arb_bot", version, about = "Cross-venue mark-price arbitrage controller")]
pub struct Args {
    // ===== Arbitrage =====
    /// Minimum |B - A| mark difference to open a pair.
    #[arg(long, env = "MINIMUM_ENTRY_THRESHOLD", default_value = "0.05")]
    pub min_entry_threshold: Decimal,
    /// Mark difference below which an open pair is unwound.
    #[arg(long, env = "MAXIMUM_EXIT_THRESHOLD", default_value = "0.03")]
    pub max_exit_threshold: Decimal,
    /// Max absolute base-asset position per venue.
    #[arg(long, env = "RISK_THRESHOLD", default_value = "1.01")]
    pub risk_threshold: Decimal,
    #[arg(long, env = "MAXIMUM_SLIPPAGE", default_value = "0.03")]
    pub max_slippage: Decimal,
    /// Fixed quantity traded per leg.
    #[arg(long, env = "TRADING_AMOUNT", default_value = "1")]
    pub trading_amount: Decimal,

    // ===== Driver =====
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 20)]
    pub poll_interval_secs: u64,
    /// Stop after N cycles (0 = run forever).
    #[arg(long, env = "MAX_CYCLES", default_value_t = 0)]
    pub max_cycles: u64,

    // ===== files/metrics =====
    #[arg(long, env = "METRICS_PORT", default_value_t = 9898)]
    pub metrics_port: u16,
    #[arg(long, env = "RECORD_FILE")]
    pub record_file: Option<String>,

    // ===== Paper venues =====
    #[arg(long, env = "PAPER_START_PRICE", default_value = "100")]
    pub paper_start_price: Decimal,
    /// Max reference-price move per quote.
    #[arg(long, env = "PAPER_STEP", default_value = "0.01")]
    pub paper_step: Decimal,
    /// Max quote deviation of venue A from the reference price.
    #[arg(long, env = "PAPER_SPREAD_A", default_value = "0.02")]
    pub paper_spread_a: Decimal,
    #[arg(long, env = "PAPER_SPREAD_B", default_value = "0.08")]
    pub paper_spread_b: Decimal,
    #[arg(long, env = "PAPER_LATENCY_MS", default_value_t = 50)]
    pub paper_latency_ms: u64,
    /// Probability in [0, 1] that a paper order is rejected.
    #[arg(long, env = "PAPER_REJECT_RATE", default_value_t = 0.0)]
    pub paper_reject_rate: f64,
    /// Largest quantity one paper order fills; larger orders fill partially.
    #[arg(long, env = "PAPER_MAX_FILL", default_value = "10")]
    pub paper_max_fill: Decimal,
}

/// The five constants the decision engine consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct ArbParams {
    pub min_entry_threshold: Decimal,
    pub max_exit_threshold: Decimal,
    pub risk_threshold: Decimal,
    pub max_slippage: Decimal,
    pub trading_amount: Decimal,
}

impl Default for ArbParams {
    fn default() -> Self {
        Self {
            min_entry_threshold: dec!(0.05),
            max_exit_threshold: dec!(0.03),
            risk_threshold: dec!(1.01),
            max_slippage: dec!(0.03),
            trading_amount: dec!(1),
        }
    }
}

impl ArbParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, v) in self.named() {
            if v <= Decimal::ZERO {
                return Err(ConfigError::NonPositive { name, value: v });
            }
        }
        Ok(())
    }

    /// Exit threshold above entry means both rules can signal on one sample.
    pub fn thresholds_overlap(&self) -> bool {
        self.max_exit_threshold > self.min_entry_threshold
    }

    pub fn named(&self) -> [(&'static str, Decimal); 5] {
        [
            ("min_entry_threshold", self.min_entry_threshold),
            ("max_exit_threshold", self.max_exit_threshold),
            ("risk_threshold", self.risk_threshold),
            ("max_slippage", self.max_slippage),
            ("trading_amount", self.trading_amount),
        ]
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be > 0 (got {value})")]
    NonPositive { name: &'static str, value: Decimal },
    #[error("poll interval must be at least 1s")]
    ZeroInterval,
    #[error("paper reject rate must be within [0, 1] (got {0})")]
    RejectRate(f64),
}

impl Args {
    pub fn params(&self) -> ArbParams {
        ArbParams {
            min_entry_threshold: self.min_entry_threshold,
            max_exit_threshold: self.max_exit_threshold,
            risk_threshold: self.risk_threshold,
            max_slippage: self.max_slippage,
            trading_amount: self.trading_amount,
        }
    }

    pub fn validate(&self) -> Result<ArbParams, ConfigError> {
        let params = self.params();
        params.validate()?;
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if !(0.0..=1.0).contains(&self.paper_reject_rate) {
            return Err(ConfigError::RejectRate(self.paper_reject_rate));
        }
        for (name, value) in [
            ("paper_start_price", self.paper_start_price),
            ("paper_spread_a", self.paper_spread_a),
            ("paper_spread_b", self.paper_spread_b),
            ("paper_max_fill", self.paper_max_fill),
        ] {
            if value <= Decimal::ZERO {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(params)
    }
}

pub fn load() -> Result<(Args, ArbParams), ConfigError> {
    // .env dulu, supaya env fallback clap ikut terbaca
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let params = args.validate()?;
    Ok((args, params))
}
