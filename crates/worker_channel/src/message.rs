use time::{macros::format_description, OffsetDateTime};

use crate::classify::{ProgressAction, ProgressEvent};

/// Current wall-clock time as `YYYY-MM-DD HH:MM:SS.cc`.
///
/// Uses the local offset when the platform can report it, UTC otherwise.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_timestamp(now)
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:2]"
    );
    at.format(format).unwrap_or_default()
}

/// Human-readable status line for a progress event, stamped with the current time.
pub fn progress_message(event: &ProgressEvent) -> String {
    progress_message_at(&timestamp(), event)
}

pub fn progress_message_at(timestamp: &str, event: &ProgressEvent) -> String {
    let outcome = if event.result { "done" } else { "failed" };
    match event.action {
        ProgressAction::WritingEntity => {
            let subject = event.entity_type.as_deref().unwrap_or("entity");
            format!("[{timestamp}] Writing {subject} is {outcome}")
        }
        ProgressAction::WritingFile => format!("[{timestamp}] Writing IFC file is {outcome}"),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn event(action: ProgressAction, result: bool, entity_type: Option<&str>) -> ProgressEvent {
        ProgressEvent {
            action,
            result,
            entity_type: entity_type.map(str::to_string),
            message: None,
        }
    }

    #[test]
    fn timestamp_has_centisecond_precision() {
        let at = datetime!(2024-03-07 09:05:01.987 UTC);
        assert_eq!(format_timestamp(at), "2024-03-07 09:05:01.98");
    }

    #[test]
    fn entity_messages_name_the_entity_and_outcome() {
        let ts = "2024-03-07 09:05:01.98";
        assert_eq!(
            progress_message_at(ts, &event(ProgressAction::WritingEntity, true, Some("IfcBeam"))),
            "[2024-03-07 09:05:01.98] Writing IfcBeam is done"
        );
        assert_eq!(
            progress_message_at(ts, &event(ProgressAction::WritingEntity, false, None)),
            "[2024-03-07 09:05:01.98] Writing entity is failed"
        );
    }

    #[test]
    fn file_messages_ignore_entity_type() {
        let ts = "2024-03-07 09:05:01.98";
        assert_eq!(
            progress_message_at(ts, &event(ProgressAction::WritingFile, true, Some("IfcBeam"))),
            "[2024-03-07 09:05:01.98] Writing IFC file is done"
        );
    }
}
