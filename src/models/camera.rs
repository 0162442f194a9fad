use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Camera status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Active,
}

/// Directory entry describing a currently-live camera and its owner.
/// In-memory only; reset on process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraRecord {
    pub room_id: String,
    pub owner_user_id: String,
    pub display_name: String,
    pub device_info: String,
    pub connected_at: DateTime<Utc>,
    pub status: CameraStatus,
    pub conn_id: String,
}

/// Camera entry as sent to clients (REST listing and `cameras-updated`
/// broadcasts share this shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSummary {
    pub room_id: String,
    pub name: String,
    pub device_info: String,
    pub connected_at: DateTime<Utc>,
    pub status: CameraStatus,
}

impl From<&CameraRecord> for CameraSummary {
    fn from(record: &CameraRecord) -> Self {
        Self {
            room_id: record.room_id.clone(),
            name: record.display_name.clone(),
            device_info: record.device_info.clone(),
            connected_at: record.connected_at,
            status: record.status,
        }
    }
}
