use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

use tgtg_ant::{AntConfig, ApiClient, LogNotifier, Poller};

/// Polls Too Good To Go for available surprise bags.
#[derive(Debug, Parser)]
#[command(name = "tgtg-ant", version, about)]
struct Cli {
    /// Configuration file path
    #[arg(long = "conf", default_value = "secrets/config.json")]
    conf: PathBuf,

    /// Trace requests information for debugging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Quiet: force verbose deactivation
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AntConfig::from_file(&cli.conf) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.verbose);
            if e.is_missing_file() {
                tracing::error!(
                    "you need to create file {} that will be loaded and used as your personal configuration",
                    cli.conf.display()
                );
            } else {
                tracing::error!("{}", e);
            }
            return ExitCode::FAILURE;
        }
    };

    let verbose = if cli.verbose {
        true
    } else if cli.quiet {
        false
    } else {
        config.verbose()
    };
    init_tracing(verbose);
    let config = Arc::new(config.with_verbose(verbose));

    let cancel = CancellationToken::new();
    let client = match ApiClient::new(config, cancel.clone()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received, will shut down soon...");
            cancel.cancel();
        }
    });

    let mut poller = Poller::new(client, LogNotifier);
    match poller.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "tgtg_ant=debug" } else { "tgtg_ant=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
