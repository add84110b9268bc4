#![forbid(unsafe_code)]
//! Conversion session glue between [`ifc_mapping`] and [`worker_channel`].
//!
//! [`Converter`] is the composition root: it owns one [`WorkerChannel`] and
//! one [`MappingRuleStore`](ifc_mapping::MappingRuleStore), maps a batch of
//! records, sends the entities to the worker as a single `create_ifc`
//! request and forwards progress as [`CreationStatus`] updates.
//!
//! [`WorkerChannel`]: worker_channel::WorkerChannel

mod config;
mod converter;
mod error;
mod progress;
mod request;

pub use config::{
    ConfigError, ConverterConfig, ProjectSettings, WorkerSection, DEFAULT_PROJECT_NAME,
    DEFAULT_SITE_NAME,
};
pub use converter::{read_records, ConversionReport, Converter};
pub use error::ConvertError;
pub use progress::{CreationStatus, ProgressNotifier};
pub use request::{RequestEntities, RequestHeader, WorkerRequest, ACTION_CREATE_IFC};
