use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_NORMAL: u8 = 0x00;
pub const STATUS_COVER_OPEN: u8 = 0x01;
pub const STATUS_PAPER_EMPTY: u8 = 0x02;
pub const STATUS_PAPER_NEAR_END: u8 = 0x04;
pub const STATUS_PRINTER_ERROR: u8 = 0x08;

/// Printer status decoded from the raw bitmask.
///
/// Produced fresh for every query, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status_code: u8,
    pub is_normal: bool,
    pub is_paper_empty: bool,
    pub is_paper_near_end: bool,
    pub is_cover_open: bool,
    pub is_error: bool,
    pub checked_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn from_code(status_code: u8) -> Self {
        Self {
            status_code,
            is_normal: status_code == STATUS_NORMAL,
            is_paper_empty: status_code & STATUS_PAPER_EMPTY != 0,
            is_paper_near_end: status_code & STATUS_PAPER_NEAR_END != 0,
            is_cover_open: status_code & STATUS_COVER_OPEN != 0,
            is_error: status_code & STATUS_PRINTER_ERROR != 0,
            checked_at: Utc::now(),
        }
    }
}

/// Payload pushed to the status subscriber on every monitor tick.
///
/// Serializes either as the snapshot itself or as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusEvent {
    Status(StatusSnapshot),
    Error { error: String },
}

impl StatusEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_code() {
        let snapshot = StatusSnapshot::from_code(STATUS_NORMAL);
        assert!(snapshot.is_normal);
        assert!(!snapshot.is_paper_empty);
        assert!(!snapshot.is_paper_near_end);
        assert!(!snapshot.is_cover_open);
        assert!(!snapshot.is_error);
    }

    #[test]
    fn test_combined_flags() {
        let snapshot = StatusSnapshot::from_code(STATUS_COVER_OPEN | STATUS_PAPER_NEAR_END);
        assert!(!snapshot.is_normal);
        assert!(snapshot.is_cover_open);
        assert!(snapshot.is_paper_near_end);
        assert!(!snapshot.is_paper_empty);
        assert!(!snapshot.is_error);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(StatusSnapshot::from_code(STATUS_PAPER_EMPTY)).unwrap();
        assert_eq!(json["statusCode"], 2);
        assert_eq!(json["isNormal"], false);
        assert_eq!(json["isPaperEmpty"], true);
        assert!(json.get("checkedAt").is_some());
    }

    #[test]
    fn test_error_event_shape() {
        let event = StatusEvent::error("Read timed out");
        assert!(event.is_error());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Read timed out"}));
    }
}
