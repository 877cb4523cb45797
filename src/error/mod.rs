use std::io;

use thiserror::Error;

use crate::codec::CodecError;
use crate::config::GeometryError;
use crate::header::HeaderError;

/// Failure kinds surfaced by `save` and `load`.
///
/// Pipeline functions return `anyhow::Result`; these appear either as the root
/// error or as attached context, so callers can always recover the kind with
/// `err.downcast_ref::<StorageError>()`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] GeometryError),

    #[error("invalid video container: {0}")]
    InvalidContainer(String),

    #[error("malformed header frame: {0}")]
    MalformedHeader(#[source] HeaderError),

    #[error("cannot encode header: {0}")]
    UnencodableHeader(#[source] HeaderError),

    #[error("corrupt video container: {0}")]
    CorruptContainer(String),

    #[error("frame codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("decode worker {worker} failed")]
    WorkerFailure { worker: usize },
}
