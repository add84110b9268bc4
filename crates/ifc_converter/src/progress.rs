use serde::Serialize;

/// Progress of a running conversion, as shown to the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationStatus {
    /// Mapped entities plus the final file write.
    pub total_steps: u64,
    pub current_step: u64,
    pub percent: f64,
    pub message: String,
}

impl CreationStatus {
    pub fn new(total_steps: u64, current_step: u64, message: impl Into<String>) -> Self {
        let percent = if total_steps == 0 {
            0.0
        } else {
            current_step as f64 / total_steps as f64 * 100.0
        };
        Self {
            total_steps,
            current_step,
            percent,
            message: message.into(),
        }
    }
}

/// Receives progress updates during a conversion.
pub trait ProgressNotifier {
    fn notify(&mut self, status: &CreationStatus);
}

impl<F> ProgressNotifier for F
where
    F: FnMut(&CreationStatus),
{
    fn notify(&mut self, status: &CreationStatus) {
        self(status)
    }
}
