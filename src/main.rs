//! Resilient exchange demo.
//!
//! Builds a decorated client for a greeting contract over a flaky in-process
//! remote and drives a batch of calls through it, logging every outcome.
//!
//! ```text
//! --config (TOML) ─▶ ResilienceConfig ─▶ DecoratorsBuilder::from_config
//!                                              │ + optional fallback
//!                                              ▼
//!                    ResilientClient ◀── flaky remote (failure rate, latency)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use serde_json::{json, Value};

use resilient_exchange::config::{load_config, ResilienceConfig};
use resilient_exchange::observability::{init_logging, init_metrics, logging};
use resilient_exchange::{
    remote_fn, CallContract, CallError, DecoratorsBuilder, ErrorKind, Operation, RemoteError, ResilientClient,
    ServiceImpl, Signature,
};

#[derive(Parser)]
#[command(name = "resilient-exchange")]
#[command(about = "Drive a resilience-decorated client against a flaky remote", long_about = None)]
struct Cli {
    /// Resilience configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of calls to make.
    #[arg(short = 'n', long, default_value_t = 20)]
    calls: u32,

    /// Probability that a remote call fails with a 503.
    #[arg(short, long, default_value_t = 0.3)]
    failure_rate: f64,

    /// Upper bound of the simulated remote latency.
    #[arg(long, default_value_t = 50)]
    max_latency_ms: u64,

    /// Serve server-side failures from a local fallback.
    #[arg(long)]
    fallback: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    init_logging(
        &logging::default_directives(&config.observability.log_level),
        config.observability.log_compact,
    )?;

    tracing::info!("resilient-exchange v0.1.0 starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let contract = CallContract::builder("GreetingService")
        .remote(greeting_signature())
        .default_operation(
            Signature::new("default_greeting").returns("String"),
            |client: ResilientClient, args| async move { client.call("greeting", args).await },
        )
        .build()?;

    let mut decorators = DecoratorsBuilder::from_config("greetings", &config);
    if cli.fallback {
        let fallback = ServiceImpl::builder("LocalGreeting")
            .handle(greeting_signature(), |_args| async { Ok(json!("Hello from the fallback")) })
            .build();
        decorators = decorators.with_fallback_for_kind(fallback, ErrorKind::RemoteServer);
    }
    let decorators = decorators.build();

    tracing::info!(
        stages = ?decorators.describe(),
        failure_rate = cli.failure_rate,
        calls = cli.calls,
        "Configuration loaded"
    );

    let failure_rate = cli.failure_rate.clamp(0.0, 1.0);
    let max_latency_ms = cli.max_latency_ms;
    let client = ResilientClient::builder(decorators)
        .remote(remote_fn(move |operation: &Operation, _args| {
            let (fail, latency) = {
                let mut rng = rand::thread_rng();
                (rng.gen_bool(failure_rate), rng.gen_range(0..=max_latency_ms))
            };
            let name = operation.name().to_string();
            async move {
                tokio::time::sleep(Duration::from_millis(latency)).await;
                if fail {
                    Err(CallError::from(RemoteError::with_status(503, "service unavailable")))
                } else {
                    Ok(Value::String(format!("Hello from {name}")))
                }
            }
        }))
        .build(contract)?;

    tracing::info!(client = %client, "Client ready");

    let mut succeeded = 0u32;
    let mut failed = 0u32;
    for i in 0..cli.calls {
        let operation = if i % 2 == 0 { "greeting" } else { "default_greeting" };
        match client.call(operation, Vec::new()).await {
            Ok(value) => {
                succeeded += 1;
                tracing::info!(call = i, operation, response = %value, "Call succeeded");
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(call = i, operation, kind = e.kind().as_str(), error = %e, "Call failed");
            }
        }
    }

    tracing::info!(succeeded, failed, "Done");
    Ok(())
}

fn greeting_signature() -> Signature {
    Signature::new("greeting").returns("String")
}
