use std::{
    fs,
    path::{Path, PathBuf},
};

use ifc_mapping::{
    BatchOutcome, ConversionSession, MappingEngine, MappingRuleStore, RawRecord, UnmappedRecord,
};
use serde::Serialize;
use tracing::{info, warn};
use worker_channel::{ChannelError, TerminalResult, WorkerChannel};

use crate::{
    config::{ConverterConfig, ProjectSettings},
    error::ConvertError,
    progress::{CreationStatus, ProgressNotifier},
    request::WorkerRequest,
};

/// Outcome of a successful conversion.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub output_file: String,
    pub mapped_count: usize,
    pub unmapped: Vec<UnmappedRecord>,
}

/// Owns the worker channel and the loaded mapping rules, and runs
/// conversions against them.
pub struct Converter {
    channel: WorkerChannel,
    store: MappingRuleStore,
    engine: MappingEngine,
    session: ConversionSession,
    project: ProjectSettings,
    output_path: Option<PathBuf>,
}

impl Converter {
    pub fn new(channel: WorkerChannel, project: ProjectSettings) -> Self {
        Self {
            channel,
            store: MappingRuleStore::new(),
            engine: MappingEngine::default(),
            session: ConversionSession::new(),
            project,
            output_path: None,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(
            WorkerChannel::new(config.worker_config()),
            config.project.clone(),
        )
    }

    pub fn with_engine(mut self, engine: MappingEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn channel(&self) -> &WorkerChannel {
        &self.channel
    }

    pub fn store(&self) -> &MappingRuleStore {
        &self.store
    }

    pub fn session(&self) -> &ConversionSession {
        &self.session
    }

    pub fn project(&self) -> &ProjectSettings {
        &self.project
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) {
        self.output_path = Some(path.into());
    }

    /// Reads and loads a mapping document. On failure the previous rules stay.
    pub fn load_mapping_file(&mut self, path: &Path) -> Result<(), ConvertError> {
        let document = read_input(path)?;
        self.store
            .load(&document)
            .map_err(|source| ConvertError::MappingDocument {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), rules = self.store.len(), "mapping document loaded");
        Ok(())
    }

    /// Maps `records` without contacting the worker.
    pub fn map_records(&self, records: &[RawRecord]) -> BatchOutcome {
        self.engine.transform_batch(records, &self.store)
    }

    /// Maps `records`, sends the mapped entities to a freshly started worker
    /// and waits for the output file.
    ///
    /// The worker is stopped and the session cleared however the run ends.
    pub async fn run_conversion(
        &mut self,
        records: &[RawRecord],
        notifier: &mut dyn ProgressNotifier,
    ) -> Result<ConversionReport, ConvertError> {
        let output_path = self
            .output_path
            .as_deref()
            .ok_or(ConvertError::OutputPathNotSet)?
            .to_string_lossy()
            .into_owned();

        self.session.run(&self.engine, &self.store, records);
        let mapped_count = self.session.mapped_entities().len();
        let unmapped = self.session.unmapped_records().to_vec();
        info!(
            mapped = mapped_count,
            unmapped = unmapped.len(),
            "records mapped"
        );

        let result = self.send_to_worker(&output_path, notifier).await;
        self.channel.stop();
        self.session.clear();

        let terminal = match result {
            Ok(terminal) => terminal,
            Err(source) => return Err(ConvertError::Channel { source, unmapped }),
        };
        if !terminal.is_success() {
            let message = terminal.message.unwrap_or_default();
            warn!(status = %terminal.status, %message, "worker reported failure");
            return Err(ConvertError::WorkerFailed {
                status: terminal.status,
                message,
                unmapped,
            });
        }

        Ok(ConversionReport {
            output_file: terminal.file.unwrap_or(output_path),
            mapped_count,
            unmapped,
        })
    }

    async fn send_to_worker(
        &self,
        output_path: &str,
        notifier: &mut dyn ProgressNotifier,
    ) -> Result<TerminalResult, ChannelError> {
        let elements = self.session.mapped_entities();
        let request = WorkerRequest::create_ifc(&self.project, elements, output_path);
        let total_steps = elements.len() as u64 + 1;

        self.channel.start().await?;
        self.channel
            .send_request_with_progress(&request, |count, message| {
                notifier.notify(&CreationStatus::new(total_steps, count, message));
            })
            .await
    }
}

pub(crate) fn read_input(path: &Path) -> Result<String, ConvertError> {
    fs::read_to_string(path).map_err(|source| ConvertError::ReadInput {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a target data file: a JSON array of `{userKey, userArgs}` records.
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>, ConvertError> {
    let data = read_input(path)?;
    RawRecord::parse_batch(&data).map_err(|source| ConvertError::TargetData {
        path: path.to_path_buf(),
        source,
    })
}
