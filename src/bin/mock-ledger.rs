//! Stand-alone mock ledger served over HTTP, for running the harness
//! end to end without a real node.

use clap::Parser;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use ledger_harness::config::schema::ObservabilityConfig;
use ledger_harness::ledger::mock::{router, MockConfig, MockLedger};
use ledger_harness::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "mock-ledger")]
#[command(about = "In-memory ledger node speaking the harness HTTP protocol", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:50211")]
    bind: String,

    /// Fraction of submissions answered BUSY
    #[arg(long, default_value_t = 0.0)]
    busy_ratio: f64,

    /// Receipt polls answered UNKNOWN before the final status
    #[arg(long, default_value_t = 1)]
    confirm_after: u32,

    /// Added latency per submission, in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&ObservabilityConfig::default());

    if !(0.0..=1.0).contains(&cli.busy_ratio) {
        return Err(format!("--busy-ratio must be within [0, 1], got {}", cli.busy_ratio).into());
    }

    let ledger = MockLedger::new(MockConfig {
        busy_ratio: cli.busy_ratio,
        confirm_after: cli.confirm_after,
        submit_latency: Duration::from_millis(cli.latency_ms),
        ..MockConfig::default()
    });

    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        busy_ratio = cli.busy_ratio,
        confirm_after = cli.confirm_after,
        "Mock ledger listening"
    );

    let app = router(ledger).layer(TraceLayer::new_for_http());
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
