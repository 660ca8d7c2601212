//! Error types emitted by the Lume CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use lume_core::{CommandError, ConfigError, LookupError, PlanError};
use lume_data::ClientBuildError;
use thiserror::Error;

/// Errors emitted by the Lume CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The frame interval must be at least one millisecond.
    #[error("frame interval must be at least 1 ms")]
    FrameInterval,
    /// Playback tunables were rejected.
    #[error("invalid playback settings: {0}")]
    Playback(#[from] ConfigError),
    /// An HTTP collaborator could not be constructed.
    #[error(transparent)]
    ClientBuild(#[from] ClientBuildError),
    /// A start or end location could not be resolved.
    #[error("could not resolve {field} {input:?}: {source}")]
    Geocode {
        field: &'static str,
        input: String,
        #[source]
        source: LookupError,
    },
    /// The route could not be planned.
    #[error("failed to plan route: {0}")]
    Plan(#[from] PlanError),
    /// The controller refused a command.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The async runtime or signal handler failed.
    #[error("runtime failure: {0}")]
    Runtime(#[source] std::io::Error),
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    Serialize(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),
}
