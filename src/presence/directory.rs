use std::collections::HashMap;

use chrono::Utc;

use crate::models::{CameraRecord, CameraStatus, Identity};
use crate::policy;

/// In-memory directory of live camera rooms. All mutations happen on the
/// Presence Coordinator's critical path under its lock; this type itself
/// does no synchronization.
#[derive(Debug, Default)]
pub struct CameraDirectory {
    cameras: HashMap<String, CameraRecord>,
}

impl CameraDirectory {
    pub fn new() -> Self {
        Self {
            cameras: HashMap::new(),
        }
    }

    /// Insert or replace the entry for `room_id`. The most recent successful
    /// camera join wins ownership of the room.
    pub fn register(
        &mut self,
        room_id: &str,
        owner_user_id: &str,
        display_name: &str,
        device_info: &str,
        conn_id: &str,
    ) -> CameraRecord {
        let record = CameraRecord {
            room_id: room_id.to_string(),
            owner_user_id: owner_user_id.to_string(),
            display_name: display_name.to_string(),
            device_info: device_info.to_string(),
            connected_at: Utc::now(),
            status: CameraStatus::Active,
            conn_id: conn_id.to_string(),
        };
        self.cameras.insert(room_id.to_string(), record.clone());
        record
    }

    /// Remove the entry for `room_id`; no-op if absent.
    pub fn unregister(&mut self, room_id: &str) -> Option<CameraRecord> {
        self.cameras.remove(room_id)
    }

    pub fn get(&self, room_id: &str) -> Option<&CameraRecord> {
        self.cameras.get(room_id)
    }

    /// Records visible to `identity`: admins see all, other users only the
    /// cameras they own. The REST listing and the `cameras-updated`
    /// broadcast both go through here so the two paths cannot drift.
    pub fn list_visible_to(&self, identity: &Identity) -> Vec<CameraRecord> {
        let mut records: Vec<CameraRecord> = self
            .cameras
            .values()
            .filter(|record| policy::can_view_camera(identity, record))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        records
    }

    /// Unfiltered snapshot, for broadcast fan-out that filters per
    /// recipient after the lock is released.
    pub fn records(&self) -> Vec<CameraRecord> {
        let mut records: Vec<CameraRecord> = self.cameras.values().cloned().collect();
        records.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        records
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}
