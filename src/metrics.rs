// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Cycle metrics --------
pub static CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("arb_cycles_total", "controller cycles by outcome"),
        &["outcome"],
    )
    .unwrap()
});

pub static SAMPLE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("arb_sample_errors_total", "failed venue state samples"),
        &["venue"],
    )
    .unwrap()
});

pub static ORDERS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("arb_orders_total", "order legs placed (labels: venue, result)"),
        &["venue", "result"],
    )
    .unwrap()
});

// Full sample -> decide -> execute latency (milliseconds)
pub static CYCLE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("arb_cycle_latency_ms", "Latency of one controller cycle (ms)")
            .buckets(vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]),
    )
    .unwrap()
});

// -------- Last sampled state --------
pub static PRICE_DIFF: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("arb_price_diff", "last |B - A| mark difference").unwrap());

pub static MARK_PRICE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("arb_mark_price", "last mark price per venue"), &["venue"]).unwrap()
});

pub static POSITION: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("arb_position", "last reported position per venue"), &["venue"]).unwrap()
});

// ---- Config visibility ----
pub static CONFIG_PARAM: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("arb_config_param", "arbitrage parameters (label: param)"),
        &["param"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(CYCLES.clone())),
        REGISTRY.register(Box::new(SAMPLE_ERRORS.clone())),
        REGISTRY.register(Box::new(ORDERS.clone())),
        REGISTRY.register(Box::new(CYCLE_LATENCY.clone())),
        REGISTRY.register(Box::new(PRICE_DIFF.clone())),
        REGISTRY.register(Box::new(MARK_PRICE.clone())),
        REGISTRY.register(Box::new(POSITION.clone())),
        REGISTRY.register(Box::new(CONFIG_PARAM.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics)
fn handle_client(mut stream: TcpStream) {
    // headers are read and ignored
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Binds first so a port clash surfaces at startup, then serves from a
/// dedicated OS thread (keeps the Tokio runtime clean).
pub fn serve_metrics(port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)?;
    tracing::info!(%addr, "metrics listening (/ and /metrics)");

    thread::spawn(move || {
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => tracing::warn!(error = %e, "metrics accept error"),
            }
        }
    });
    Ok(())
}
