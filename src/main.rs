//! Ledger throughput harness.
//!
//! Drives a ledger node at a fixed submission rate from several producers,
//! resolves every accepted operation to its receipt, and reports the
//! confirmed throughput.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌───────────┐   spawn    ┌────────────┐  tokens   ┌────────────┐
//!   │  Monitor  │──────────▶│ Producer×P │──────────▶│  Consumer  │
//!   │  (setup)  │           │ (paced)    │  (FIFO)   │ (receipts) │
//!   └─────┬─────┘           └─────┬──────┘           └─────┬──────┘
//!         │                       │ submit                 │ poll
//!         ▼                       ▼                        ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │     SubmissionClient (retry, reconnect, receipt polling)     │
//!   └──────────────────────────────┬───────────────────────────────┘
//!                                  ▼
//!                  LedgerTransport (HTTP node or in-memory mock)
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use ledger_harness::config::{load_config, validate_config, HarnessConfig};
use ledger_harness::harness::worker::{self, Worker};
use ledger_harness::harness::{workload, HarnessContext, Monitor, RunSettings};
use ledger_harness::ledger::builder::PRIVATE_KEY_ENV_VAR;
use ledger_harness::ledger::{
    HttpTransportFactory, MockConfig, MockLedger, OperationBuilder, TransportFactory,
};
use ledger_harness::observability::{logging::init_logging, metrics::init_metrics};

#[derive(Parser)]
#[command(name = "ledger-harness")]
#[command(about = "Throughput harness for ledger nodes", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run against an in-process mock ledger instead of a node
    #[arg(long, global = true)]
    mock: bool,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full throughput measurement
    Run {
        #[arg(short, long)]
        producers: Option<usize>,
        #[arg(short, long)]
        iterations: Option<u64>,
        /// Submissions per second, per producer
        #[arg(short, long)]
        rate: Option<u32>,
    },
    /// Submit one operation of the configured workload and wait for it
    SubmitOnce {
        /// Also fetch the paid detailed record
        #[arg(long)]
        record: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HarnessConfig::default(),
    };
    if let Commands::Run {
        producers,
        iterations,
        rate,
    } = &cli.command
    {
        if let Some(p) = producers {
            config.run.producers = *p;
        }
        if let Some(i) = iterations {
            config.run.iterations = *i;
        }
        if let Some(r) = rate {
            config.run.submit_rate = *r;
        }
        if let Err(errors) = validate_config(&config) {
            for e in &errors {
                eprintln!("invalid option: {}", e);
            }
            return Err("invalid command line overrides".into());
        }
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), mock = cli.mock, "ledger-harness starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let context = build_context(&config, cli.mock)?;

    tokio::select! {
        result = execute(cli.command, &config, context, cli.json) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, aborting run");
            Err("interrupted".into())
        }
    }
}

fn build_context(
    config: &HarnessConfig,
    mock: bool,
) -> Result<HarnessContext, Box<dyn std::error::Error>> {
    let endpoint = config.endpoint()?;
    let payer = config.payer_account()?;

    let (factory, builder): (Arc<dyn TransportFactory>, OperationBuilder) = if mock {
        let builder = match std::env::var(PRIVATE_KEY_ENV_VAR) {
            Ok(_) => OperationBuilder::from_env(payer, endpoint.node_account)?,
            Err(_) => {
                tracing::info!("No payer key set, signing with a throwaway key");
                OperationBuilder::new(PrivateKeySigner::random(), payer, endpoint.node_account)
            }
        };
        (Arc::new(MockLedger::new(MockConfig::default())), builder)
    } else {
        (
            Arc::new(HttpTransportFactory),
            OperationBuilder::from_env(payer, endpoint.node_account)?,
        )
    };

    tracing::info!(
        endpoint = %endpoint.base_url(),
        payer = %payer,
        node = %endpoint.node_account,
        "Configuration loaded"
    );

    Ok(HarnessContext::new(
        endpoint,
        factory,
        builder.with_wind_back(config.payer.wind_back_secs),
        config.client_policy(),
    ))
}

async fn execute(
    command: Commands,
    config: &HarnessConfig,
    context: HarnessContext,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Run { .. } => {
            let workload = workload::from_config(&config.workload)?;
            let monitor = Monitor::new(context, RunSettings::from(&config.run), workload);
            let handle = Worker::Monitor(monitor).spawn();
            let report = worker::join("monitor", handle).await?.into_run()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.summary());
            }
        }
        Commands::SubmitOnce { record } => {
            let mut workload = workload::from_config(&config.workload)?;
            let mut client = context.client()?;
            workload.prepare(&mut client, &context.builder).await?;

            let request = workload.next_request(&context.builder, 0, 0)?;
            let result = client.submit_and_confirm(&request).await?;
            let id = result.submission.id;

            let detailed = if record && result.submission.is_accepted() {
                Some(client.fetch_detailed_record(&id, &context.builder).await?)
            } else {
                None
            };

            if json {
                let output = serde_json::json!({
                    "id": id.to_string(),
                    "outcome": result.submission.outcome.to_string(),
                    "attempts": result.submission.attempts,
                    "receipt": result.confirmation.as_ref().map(|c| c.label()),
                    "record": detailed,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!(
                    "{} {} after {} attempt(s)",
                    id, result.submission.outcome, result.submission.attempts
                );
                if let Some(confirmation) = &result.confirmation {
                    println!("receipt: {}", confirmation.label());
                }
                if let Some(detailed) = &detailed {
                    println!(
                        "record: status {} fee {} transfers {}",
                        detailed.receipt.status,
                        detailed.fee_charged,
                        detailed.transfers.len()
                    );
                }
            }
        }
    }
    Ok(())
}
