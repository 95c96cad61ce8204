use serde::{Deserialize, Serialize};

use crate::{domain::Todo, error::ApiError};

/// One row-level change on the `todos` relation, as the backend emits it.
///
/// The wire shape keeps the backend's convention: the discriminator travels in
/// an `eventType` field and the affected row arrives under `new` (insert and
/// update) or `old` (delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Insert { new: Todo },
    Update { new: Todo },
    Delete { old: Todo },
}

/// A single frame on the change-feed websocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FeedFrame {
    Change(ChangeEvent),
    Error(ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn insert_frame_round_trips_with_event_type_tag() {
        let raw = r#"{"type":"change","payload":{"eventType":"INSERT","new":{"id":3,"title":"Call mom"}}}"#;
        let frame: FeedFrame = serde_json::from_str(raw).expect("parse");
        assert_eq!(
            frame,
            FeedFrame::Change(ChangeEvent::Insert {
                new: Todo::new(3, "Call mom"),
            })
        );
        let encoded = serde_json::to_string(&frame).expect("encode");
        assert_eq!(encoded, raw);
    }

    #[test]
    fn delete_event_carries_old_row() {
        let raw = r#"{"eventType":"DELETE","old":{"id":1,"title":"Buy milk"}}"#;
        let event: ChangeEvent = serde_json::from_str(raw).expect("parse");
        assert_eq!(
            event,
            ChangeEvent::Delete {
                old: Todo::new(1, "Buy milk"),
            }
        );
    }

    #[test]
    fn error_frame_round_trips() {
        let frame = FeedFrame::Error(ApiError::new(ErrorCode::Unavailable, "feed draining"));
        let encoded = serde_json::to_string(&frame).expect("encode");
        let decoded: FeedFrame = serde_json::from_str(&encoded).expect("parse");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let raw = r#"{"eventType":"TRUNCATE","new":{"id":1,"title":"x"}}"#;
        assert!(serde_json::from_str::<ChangeEvent>(raw).is_err());
    }
}
