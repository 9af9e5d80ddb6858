use std::time::Duration;

use crate::cli::Cli;
use crate::color::ColorMode;
use crate::error::ConfigError;
use crate::selector::Selector;

/// Validated settings the reconciler runs with.
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// `None` means all namespaces.
    pub namespace: Option<String>,
    pub selector: Selector,
    pub refresh_interval: Duration,
    pub color_mode: ColorMode,
}

impl TailConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let selector =
            Selector::parse(&cli.selector).map_err(|source| ConfigError::InvalidSelector {
                selector: cli.selector.clone(),
                source,
            })?;
        if cli.refresh.is_zero() {
            return Err(ConfigError::InvalidRefreshInterval);
        }
        let color_mode = cli.colored_output.parse()?;
        let namespace = match cli.namespace.trim() {
            "" => None,
            ns => Some(ns.to_string()),
        };

        Ok(Self {
            namespace,
            selector,
            refresh_interval: cli.refresh,
            color_mode,
        })
    }
}
