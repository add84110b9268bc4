use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors surfaced by [`crate::WorkerChannel`].
///
/// None of these leave the channel wedged: after any of them the caller may
/// `start()` again, or keep using a channel that is still running.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("worker executable `{executable}` could not be spawned: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("worker process is not running")]
    NotRunning,
    #[error("worker process exited before answering (exit code: {code:?})")]
    ProcessTerminated { code: Option<i32> },
    #[error("worker {stream} unavailable")]
    StreamUnavailable { stream: &'static str },
    #[error("a request is already in flight on this worker channel")]
    RequestInFlight,
    #[error("worker output is out of step after an abandoned request; restart the worker")]
    Desynchronized,
    #[error("worker did not answer within {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("failed to serialize worker request: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write request to worker stdin: {0}")]
    StdinWrite(#[source] std::io::Error),
}
