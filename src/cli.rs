use std::io::{self, IsTerminal};

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::die;
use crate::router::{RouterClient, DEFAULT_API_BASE};
use crate::utils::errors::with_sources;
use crate::RequestedColorMode;

pub(crate) mod chat;
pub(crate) mod list;

/// Environment variable holding the `tracing` filter directives.
pub(crate) const LOG_VAR: &str = "ROUTERCHAT_LOG";

#[derive(Clone, Copy, strum_macros::Display)]
pub(crate) enum ColorMode {
    On,
    Off,
}

impl ColorMode {
    /// Returns whether ANSI color should be used
    /// If the user has specified a preference, this is honored. This preference
    /// can be specified through the command line or the "NO_COLOR" environment
    /// variable. If the user hasn't stated a preference, color is enabled if the
    /// output is a terminal.
    pub(crate) fn resolve_auto(cm: RequestedColorMode) -> ColorMode {
        match cm {
            RequestedColorMode::Auto => {
                let disable_color =
                    std::env::var_os("NO_COLOR").is_some() || !io::stdout().is_terminal();

                if disable_color {
                    ColorMode::Off
                } else {
                    ColorMode::On
                }
            }
            RequestedColorMode::On => ColorMode::On,
            RequestedColorMode::Off => ColorMode::Off,
        }
    }
}

/// Installs the diagnostics subscriber. Diagnostics go to standard error so
/// they never mix with a streamed reply.
pub(crate) fn init_logging(color: ColorMode) {
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(matches!(color, ColorMode::On))
        .with_target(false)
        .try_init();

    if let Err(err) = installed {
        crate::warn!("failed to install the log subscriber: {}", err);
    }
}

/// Builds the router client described by `config`, or exits.
pub(crate) fn router_client(config: &Config) -> RouterClient {
    let api_base = config
        .router
        .api_base
        .as_deref()
        .unwrap_or(DEFAULT_API_BASE);

    match RouterClient::new(config.api_key().as_deref(), api_base) {
        Ok(client) => client,
        Err(err) => die!(
            "invalid router address \"{}\": {}",
            api_base,
            with_sources(&err)
        ),
    }
}
