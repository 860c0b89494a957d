mod cli;
mod convert;
mod error;
mod proto;
mod server;

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roon_bridge_api::StatusService;
use roon_bridge_config::{RoonLogLevel, Settings};
use roon_bridge_core::{Bridge, ConnectionSupervisor, RoonConnector};

use crate::cli::Cli;
use crate::error::CliError;

const INITIAL_STATUS: &str = "Pairing...";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(settings: &Settings, verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directives(settings, verbosity))),
        )
        .with_target(false)
        .init();
}

/// Filter used when `RUST_LOG` is unset. `-v` raises the bridge level.
fn default_directives(settings: &Settings, verbosity: u8) -> String {
    let bridge = match (verbosity, settings.log_level.as_str()) {
        (0, "silent") => "off",
        (0, level) => level,
        (1, _) => "debug",
        _ => "trace",
    };
    let roon = match settings.roon_log_level {
        RoonLogLevel::None => "off",
        RoonLogLevel::Info => "info",
        RoonLogLevel::All => "trace",
    };
    format!("{bridge},h2=warn,hyper=warn,tower=warn,roon_bridge_api={roon}")
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = cli.settings()?;
    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }
    init_tracing(&settings, cli.verbose);

    let listener = TcpListener::bind(settings.listen.as_str())
        .await
        .map_err(|source| CliError::Bind {
            addr: settings.listen.clone(),
            source,
        })?;

    let supervisor_config = settings.supervisor_config();
    let reconnect = supervisor_config.reconnect.clone();
    let status = StatusService::new(INITIAL_STATUS, false);
    let bridge = Bridge::new(&settings.bridge_config(), Arc::new(status.clone()));
    let connector = RoonConnector::new(supervisor_config, status)?;

    let shutdown = CancellationToken::new();
    let supervisor =
        ConnectionSupervisor::new(Arc::new(connector), bridge.clone(), reconnect, shutdown.child_token());

    let server = server::serve(bridge.clone(), listener, shutdown.child_token());
    let supervise = supervisor.run();
    tokio::pin!(server, supervise);

    let result = tokio::select! {
        res = &mut server => res.map_err(CliError::from),
        res = &mut supervise => res.map_err(CliError::from),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    };

    shutdown.cancel();
    bridge.shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_follows_settings() {
        let settings = Settings::default();
        assert_eq!(
            default_directives(&settings, 0),
            "info,h2=warn,hyper=warn,tower=warn,roon_bridge_api=off"
        );

        let chatty = Settings {
            log_level: "silent".into(),
            roon_log_level: RoonLogLevel::All,
            ..Settings::default()
        };
        assert!(default_directives(&chatty, 0).starts_with("off,"));
        assert!(default_directives(&chatty, 0).ends_with("roon_bridge_api=trace"));
        assert!(default_directives(&chatty, 2).starts_with("trace,"));
    }
}
