use thiserror::Error;

use crate::selector::SelectorError;

/// Error type handed back by cluster API implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse label selector \"{selector}\": {source}")]
    InvalidSelector {
        selector: String,
        #[source]
        source: SelectorError,
    },

    #[error("unknown color print mode: \"{0}\" (expected pod, line or off)")]
    InvalidColorMode(String),

    #[error("refresh interval must be greater than zero")]
    InvalidRefreshInterval,
}

#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to create kubernetes client: {0}")]
    ClientConstruction(#[source] BoxError),

    #[error("failed to list pods: {0}")]
    List(#[source] BoxError),

    #[error("unable to stream logs for {label}: {source}")]
    StreamOpen {
        label: String,
        #[source]
        source: BoxError,
    },

    #[error("error scanning for lines for {label}: {source}")]
    StreamRead {
        label: String,
        #[source]
        source: std::io::Error,
    },
}
