//! mediator-otel: dispatches sample messages through an instrumented mediator.
//!
//! # Usage
//!
//! ```bash
//! mediator-otel --dispatches 50 --fail-every 7 --record-response --log-level debug
//! ```
//!
//! Environment variables can also be used:
//! - `MEDIATOR_OTEL_DISPATCHES`: Number of concurrent sample dispatches
//! - `MEDIATOR_OTEL_FILTER`: Comma-separated message type names to skip
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector for trace and metrics export
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use futures::future::join_all;
use mediator_otel::config::Config;
use mediator_otel::mediator_core::{handler_fn, CancellationToken, Mediator, Message};
use mediator_otel::observability::metrics::init_meter_provider;
use mediator_otel::observability::tracing::{init_tracer_provider, init_tracing};
use mediator_otel::{
    ActiveSpan, EnrichResponse, Instrumentation, JsonResponse, MediatorTelemetryExt,
};
use serde::Serialize;
use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
                   _ _       _                    _       _
   _ __ ___   ___ | (_) ___ | |_ ___  _ __   ___ | |_ ___| |
  | '_ ` _ \ / _ \/ _` |/ _` | __/ _ \| '__|_/ _ \| __/ _ \ |
  | | | | | |  __/ (_| | (_| | || (_) | | |_| (_) | ||  __/ |
  |_| |_| |_|\___|\__,_|\__,_|\__\___/|_|    \___/ \__\___|_|

  mediator-otel v{} - Instrumented Mediator Demo

  Configuration:
    Instrumentation: {} {}
    Dispatches:      {}
    Fail Every:      {}
    Record Response: {}
    OTLP Endpoint:   {}
    Log Level:       {}

  Press Ctrl+C to cancel in-flight dispatches.
"#,
        version,
        config.instrumentation_name,
        config.instrumentation_version,
        config.dispatches,
        config.fail_every,
        config.record_response,
        config.otel_endpoint.as_deref().unwrap_or("(none)"),
        config.log_level
    );
}

struct GetQuote {
    symbol: &'static str,
}
impl Message for GetQuote {}

struct PlaceOrder {
    order_id: u64,
    quantity: u32,
}
impl Message for PlaceOrder {}

struct Health;
impl Message for Health {}

#[derive(Debug, Serialize)]
struct Quote {
    symbol: &'static str,
    price_cents: u64,
}

#[derive(Debug, Serialize)]
struct OrderReceipt {
    order_id: u64,
    quantity: u32,
}

#[derive(Debug, Error)]
enum DemoError {
    #[error("order {0} rejected")]
    Rejected(u64),

    #[error("dispatch cancelled")]
    Cancelled,
}

const SYMBOLS: [&str; 4] = ["ACME", "INIT", "TECH", "WIDG"];

/// Simulated handler latency; bails out early on cancellation.
async fn work(millis: u64, cancel: &CancellationToken) -> Result<(), DemoError> {
    tokio::select! {
        () = tokio::time::sleep(Duration::from_millis(millis)) => Ok(()),
        () = cancel.cancelled() => Err(DemoError::Cancelled),
    }
}

fn record_responses(span: &mut ActiveSpan, response: &dyn Any) -> anyhow::Result<()> {
    JsonResponse::<Quote>::new().enrich(span, response)?;
    JsonResponse::<OrderReceipt>::new().enrich(span, response)
}

fn build_mediator(instrumentation: &Instrumentation, fail_every: u64) -> Mediator {
    Mediator::builder()
        .with_telemetry(instrumentation)
        .handler(handler_fn(|query: GetQuote, cancel: CancellationToken| async move {
            work(5, &cancel).await?;
            let price_cents = query.symbol.bytes().map(u64::from).sum::<u64>() * 10;
            Ok::<_, anyhow::Error>(Quote {
                symbol: query.symbol,
                price_cents,
            })
        }))
        .handler(handler_fn(
            move |order: PlaceOrder, cancel: CancellationToken| async move {
                work(10 + order.order_id % 20, &cancel).await?;
                if fail_every > 0 && order.order_id % fail_every == 0 {
                    return Err(DemoError::Rejected(order.order_id).into());
                }
                Ok::<_, anyhow::Error>(OrderReceipt {
                    order_id: order.order_id,
                    quantity: order.quantity,
                })
            },
        ))
        .handler(handler_fn(|_: Health, _cancel: CancellationToken| async { Ok(()) }))
        .build()
}

async fn dispatch(mediator: &Mediator, i: usize, cancel: CancellationToken) -> anyhow::Result<()> {
    let order_id = i as u64 + 1;
    match i % 3 {
        0 => {
            let query = GetQuote {
                symbol: SYMBOLS[i % SYMBOLS.len()],
            };
            let quote: Quote = mediator.send(query, cancel).await?;
            tracing::debug!(?quote, "Quote received");
        }
        1 => {
            let order = PlaceOrder {
                order_id,
                quantity: (i % 10) as u32 + 1,
            };
            let receipt: OrderReceipt = mediator.send(order, cancel).await?;
            tracing::debug!(?receipt, "Order placed");
        }
        _ => mediator.send::<_, ()>(Health, cancel).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Tracer provider first so the tracing layer can export through it
    let tracer_provider = init_tracer_provider(config.otel_endpoint.as_deref())?;
    init_tracing(&config.log_level, Some(&tracer_provider));

    // Initialize metrics (with optional OTLP export)
    let meter_provider = init_meter_provider(config.otel_endpoint.as_deref());

    print_banner(&config);

    let options = config
        .options_builder()
        .enrich_response(record_responses)
        .build()?;
    let instrumentation =
        Instrumentation::from_providers(options, &tracer_provider, &meter_provider);
    let mediator = build_mediator(&instrumentation, config.fail_every);

    // Cancel in-flight dispatches on Ctrl+C
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, cancelling dispatches...");
            signal_cancel.cancel();
        }
    });

    let results = join_all(
        (0..config.dispatches).map(|i| dispatch(&mediator, i, cancel.child_token())),
    )
    .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        tracing::warn!(error = %err, "Dispatch failed");
    }
    tracing::info!(
        dispatched = results.len(),
        succeeded = results.len() - failed,
        failed,
        "Dispatch run complete"
    );

    // Flush pending spans and metrics
    tracer_provider.shutdown()?;
    meter_provider.shutdown()?;

    tracing::info!("mediator-otel shutdown complete");
    Ok(())
}
