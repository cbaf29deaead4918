//! The coinjoin coordinator node binary: loads configuration, wires the
//! scheduler to its external collaborators, and serves the
//! registration HTTP surface until `Ctrl+C`.
//!
//! Grounded on `rusty-node/src/main.rs`: `clap` CLI args override a
//! `confy`-loaded config file, `tracing`/`tracing-subscriber` (plus
//! `tracing-appender` for an optional log file) set up logging, and
//! shutdown is a `tokio::signal::ctrl_c()` wait that cancels every
//! spawned task.

use std::fs::File;
use std::sync::Arc;

use clap::Parser;
use coinjoin_clients::{BitcoindFeeEstimator, HttpExchangeRateProvider};
use coinjoin_core::PhaseBroadcaster;
use coinjoin_node::config::NodeConfig;
use coinjoin_node::http;
use coinjoin_scheduler::PhaseScheduler;
use confy::ConfyError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const APP_NAME: &str = "coinjoin-coordinator";
const CONFIG_NAME: &str = "node-config";

/// CoinJoin mixing-round coordinator.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the registration HTTP surface binds to, e.g. 0.0.0.0:7777.
    #[arg(long)]
    http_bind: Option<String>,

    /// bitcoind JSON-RPC endpoint for fee estimation.
    #[arg(long)]
    bitcoin_rpc_url: Option<String>,

    /// Set logging level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Path to a log file. Logs always go to stdout too.
    #[arg(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), ConfyError> {
    let args = Args::parse();

    let subscriber_builder =
        FmtSubscriber::builder().with_max_level(args.log_level.parse::<Level>().unwrap_or(Level::INFO));
    let subscriber = if let Some(log_file_path) = &args.log_file {
        let file = File::create(log_file_path).expect("failed to create log file");
        let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file);
        subscriber_builder.with_writer(non_blocking_writer).finish()
    } else {
        subscriber_builder.finish()
    };
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let path = confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)?;
    info!("configuration file path: {:?}", path);

    let mut cfg: NodeConfig = match confy::load(APP_NAME, CONFIG_NAME) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {e:?}. using default");
            NodeConfig::default()
        }
    };
    if let Some(http_bind) = args.http_bind {
        cfg.coordinator_http_bind = http_bind;
    }
    if let Some(rpc_url) = args.bitcoin_rpc_url {
        cfg.bitcoin_rpc_url = rpc_url;
    }
    info!("loaded configuration: {:#?}", cfg);

    let core_config = cfg.to_core_config();
    if let Err(reason) = core_config.validate() {
        error!("invalid configuration: {reason}");
        std::process::exit(1);
    }

    let fee_source = Arc::new(BitcoindFeeEstimator::new(
        cfg.bitcoin_rpc_url.clone(),
        cfg.bitcoin_rpc_user.clone(),
        cfg.bitcoin_rpc_password.clone(),
    ));
    let rate_source = Arc::new(HttpExchangeRateProvider::new(cfg.exchange_rate_url.clone()));
    let broadcaster = PhaseBroadcaster::default();

    let scheduler = Arc::new(PhaseScheduler::new(core_config, broadcaster, fee_source, rate_source));
    let round = scheduler.round();

    let cancel = CancellationToken::new();
    let scheduler_task = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    let app = http::router(http::AppState { round, scheduler: scheduler.clone() });
    let listener = tokio::net::TcpListener::bind(&cfg.coordinator_http_bind)
        .await
        .expect("failed to bind the registration HTTP surface");
    info!("registration HTTP surface listening on {}", cfg.coordinator_http_bind);

    let serve_cancel = cancel.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_cancel.cancelled().await })
            .await
            .expect("http server failed");
    });

    info!("coordinator running. press Ctrl+C to shut down gracefully.");
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c event");
    info!("Ctrl+C received, shutting down.");
    cancel.cancel();

    let _ = scheduler_task.await;
    let _ = server_task.await;

    Ok(())
}
