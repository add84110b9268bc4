use std::{io, path::PathBuf};

use ifc_mapping::{MappingDocumentError, UnmappedRecord};
use thiserror::Error;
use worker_channel::ChannelError;

use crate::config::ConfigError;

/// Errors surfaced by a conversion run or by the `ifc-convert` binary.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("mapping document {path} rejected: {source}")]
    MappingDocument {
        path: PathBuf,
        #[source]
        source: MappingDocumentError,
    },
    #[error("target data file {path} is not a JSON array of records: {source}")]
    TargetData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("IFC output file path is not set.")]
    OutputPathNotSet,
    /// The worker could not be reached or stopped answering. `unmapped` holds
    /// the records mapping rejected before the request was sent.
    #[error("worker channel failed: {source}")]
    Channel {
        #[source]
        source: ChannelError,
        unmapped: Vec<UnmappedRecord>,
    },
    #[error("worker reported {status}: {message}")]
    WorkerFailed {
        status: String,
        message: String,
        unmapped: Vec<UnmappedRecord>,
    },
    #[error("failed to encode report: {source}")]
    Report {
        #[source]
        source: serde_json::Error,
    },
}

impl ConvertError {
    /// Records rejected by mapping in a run that failed at the worker.
    pub fn unmapped(&self) -> &[UnmappedRecord] {
        match self {
            Self::Channel { unmapped, .. } | Self::WorkerFailed { unmapped, .. } => unmapped,
            _ => &[],
        }
    }
}
