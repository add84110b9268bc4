use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Progress marker emitted after each entity is written.
pub const ACTION_WRITING_ENTITY: &str = "writingEntity";
/// Progress marker emitted once the output file has been written.
pub const ACTION_WRITING_FILE: &str = "writingFile";
/// Status value carried by a successful terminal line.
pub const STATUS_SUCCESS: &str = "success";

/// Intermediate markers the channel reports to progress listeners.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressAction {
    WritingEntity,
    WritingFile,
}

impl ProgressAction {
    pub fn from_wire(action: &str) -> Option<Self> {
        match action {
            ACTION_WRITING_ENTITY => Some(Self::WritingEntity),
            ACTION_WRITING_FILE => Some(Self::WritingFile),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WritingEntity => ACTION_WRITING_ENTITY,
            Self::WritingFile => ACTION_WRITING_FILE,
        }
    }
}

/// A non-terminal status line from the worker.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub action: ProgressAction,
    pub result: bool,
    pub entity_type: Option<String>,
    pub message: Option<String>,
}

/// The line that concludes a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerminalResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Any additional fields the worker attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TerminalResult {
    /// Builds a terminal result from any object carrying `status`.
    ///
    /// `status`, `file` and `message` keep string values as-is; other JSON
    /// values are rendered as JSON text, and `null` leaves `file`/`message` unset.
    pub fn from_object(mut object: Map<String, Value>) -> Option<Self> {
        let status = object.remove("status").map(lenient_text)?;
        let file = object.remove("file").and_then(optional_text);
        let message = object.remove("message").and_then(optional_text);
        Some(Self {
            status,
            file,
            message,
            extra: object,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Classification of one worker output line.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerLine {
    Progress(ProgressEvent),
    Terminal(TerminalResult),
    /// Valid JSON that is neither a recognized progress marker nor a terminal result.
    Noise,
}

#[derive(Debug, Error)]
#[error("worker output line is not valid JSON: {source}")]
pub struct LineParseError {
    pub line: String,
    #[source]
    pub source: serde_json::Error,
}

/// Classifies a single framed line.
///
/// Progress is checked before terminal shape so a progress line can never
/// resolve a request. Blank lines are noise.
pub fn classify_line(line: &str) -> Result<WorkerLine, LineParseError> {
    if line.trim().is_empty() {
        return Ok(WorkerLine::Noise);
    }

    let value: Value = serde_json::from_str(line).map_err(|source| LineParseError {
        line: line.to_string(),
        source,
    })?;

    Ok(classify_value(value))
}

pub fn classify_value(value: Value) -> WorkerLine {
    let Value::Object(object) = value else {
        return WorkerLine::Noise;
    };

    if let (Some(action), Some(result)) = (object.get("action"), object.get("result")) {
        let action = action.as_str().and_then(ProgressAction::from_wire);
        if let (Some(action), Some(result)) = (action, result.as_bool()) {
            return WorkerLine::Progress(ProgressEvent {
                action,
                result,
                entity_type: string_field(&object, "entityType"),
                message: string_field(&object, "message"),
            });
        }
    }

    match TerminalResult::from_object(object) {
        Some(terminal) => WorkerLine::Terminal(terminal),
        None => WorkerLine::Noise,
    }
}

fn lenient_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn optional_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(lenient_text(other)),
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}
