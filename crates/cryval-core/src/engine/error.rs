use super::config::ConfigError;
use crate::core::io::discover::DiscoveryError;
use crate::core::io::output::OutputError;
use crate::core::io::reference::ReferenceLoadError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a whole run. Problems with individual structures are never
/// reported through this type; they become rejections instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to load reference table: {source}")]
    Reference {
        #[from]
        source: ReferenceLoadError,
    },

    #[error("Failed to discover input structures: {source}")]
    Discovery {
        #[from]
        source: DiscoveryError,
    },

    #[error("No input structures found in '{0}'")]
    NoInputStructures(PathBuf),

    #[error("Failed to write results: {source}")]
    Output {
        #[from]
        source: OutputError,
    },
}
