//! Binary error types with miette diagnostics.
//!
//! Invalid flags never get here: clap reports them and exits with 2.

use miette::Diagnostic;
use thiserror::Error;

use roon_bridge_config::ConfigError;
use roon_bridge_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Could not listen on {addr}")]
    #[diagnostic(
        code(roon_bridge::bind_failed),
        help("Check that no other process holds {addr}, or pick another address with --host.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration")]
    #[diagnostic(
        code(roon_bridge::config),
        help("Run with --print-config to see the merged settings.")
    )]
    Config(#[from] ConfigError),

    #[error("Gave up reaching a Roon core after {attempts} attempts")]
    #[diagnostic(
        code(roon_bridge::core_unreachable),
        help(
            "Check that Roon Core is running and reachable from this host.\n\
             Discovery needs UDP multicast; try --roon-host and --roon-port,\n\
             or drop --max-connect-attempts to keep retrying."
        )
    )]
    CoreUnreachable { attempts: u32 },

    #[error(transparent)]
    #[diagnostic(code(roon_bridge::core))]
    Core(CoreError),

    #[error("gRPC server failed")]
    #[diagnostic(code(roon_bridge::server))]
    Server(#[from] tonic::transport::Error),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AttemptsExhausted { attempts } => Self::CoreUnreachable { attempts },
            other => Self::Core(other),
        }
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        exit_code::GENERAL
    }
}
