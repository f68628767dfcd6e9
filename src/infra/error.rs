use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;
use tracing_subscriber::{filter::ParseError, util::TryInitError};

use crate::config::LoadError;

/// Failures while bringing the server up, before any request is handled.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("failed to prepare upload directory {}: {source}", .path.display())]
    UploadRoot { path: PathBuf, source: io::Error },
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error("invalid log filter `{spec}`: {source}")]
    LogFilter { spec: String, source: ParseError },
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(#[from] TryInitError),
}
