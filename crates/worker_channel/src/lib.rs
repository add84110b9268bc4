#![forbid(unsafe_code)]
//! Request/response channel to a long-running conversion worker over stdio.
//!
//! The worker reads one JSON request per line on stdin and answers on stdout
//! with zero or more progress lines followed by a single terminal line:
//!
//! ```text
//! -> {"header":{"action":"create_ifc",...},"entities":{...}}
//! <- {"action":"writingEntity","result":true,"entityType":"IfcColumn"}
//! <- {"action":"writingFile","result":true}
//! <- {"status":"success","file":"out.ifc"}
//! ```
//!
//! - [`LineFramer`] reassembles lines from arbitrarily split stdout chunks.
//! - [`classify_line`] sorts a line into progress, terminal or noise; malformed
//!   JSON is reported so the caller can log and drop it.
//! - [`WorkerChannel`] owns the process: `start`/`stop` are idempotent, a
//!   single request may be in flight, and a worker that exits mid-request
//!   rejects it with [`ChannelError::ProcessTerminated`] instead of hanging.
//!
//! There is no request id on the wire, so the first terminal line after a
//! request is taken as its answer. Without [`WorkerConfig::request_timeout`]
//! a worker that never answers keeps the request pending until it exits or
//! the channel is stopped. A request that times out (or whose future is
//! dropped) leaves the channel [`ChannelState::Desynced`]: further requests
//! fail with [`ChannelError::Desynchronized`] until the worker's late terminal
//! line has been drained or the worker is stopped and started again.
//!
//! Framing is strictly one JSON document per line. A worker that pretty-prints
//! its output (for example Python's `json.dumps(..., indent=4)`) spreads each
//! document over several lines; every fragment fails to parse and is logged
//! and dropped, so none of that worker's progress or results reach the caller.
//!
//! ```rust,no_run
//! use worker_channel::{WorkerChannel, WorkerConfig};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = WorkerChannel::new(
//!     WorkerConfig::builder()
//!         .runtime_dir("/opt/converter/conda_env")
//!         .script("/opt/converter/mainPython/main.py")
//!         .build(),
//! );
//! channel.start().await?;
//! let result = channel
//!     .send_request_with_progress(&serde_json::json!({"header": {}}), |count, message| {
//!         println!("{count}: {message}");
//!     })
//!     .await?;
//! channel.stop();
//! println!("{}", result.status);
//! # Ok(()) }
//! ```

mod channel;
mod classify;
mod config;
mod error;
mod framer;
mod message;
mod process;

pub use channel::{ChannelState, WorkerChannel, WORKER_STDERR_TARGET};
pub use classify::{
    classify_line, classify_value, LineParseError, ProgressAction, ProgressEvent, TerminalResult,
    WorkerLine, ACTION_WRITING_ENTITY, ACTION_WRITING_FILE, STATUS_SUCCESS,
};
pub use config::{
    Platform, WorkerConfig, WorkerConfigBuilder, DEFAULT_RUNTIME_DIR, DEFAULT_WORKER_SCRIPT,
    WORKER_EXECUTABLE_ENV, WORKER_RUNTIME_DIR_ENV, WORKER_SCRIPT_ENV,
};
pub use error::ChannelError;
pub use framer::{FramedLines, LineFramer};
pub use message::{format_timestamp, progress_message, progress_message_at, timestamp};
