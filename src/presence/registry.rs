use std::collections::{HashMap, HashSet};

/// Signaling-scope unit: at most one camera publisher plus any number of
/// viewer subscribers.
#[derive(Debug)]
pub struct Room {
    pub room_id: String,
    pub camera: Option<String>,
    pub viewers: HashSet<String>,
}

impl Room {
    fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            camera: None,
            viewers: HashSet::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.camera.is_none() && self.viewers.is_empty()
    }
}

/// What a `leave` did, so the coordinator can drive notifications.
#[derive(Debug, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Viewers left behind by a departing camera (empty for viewer leaves).
    pub orphaned_viewers: Vec<String>,
    pub room_deleted: bool,
}

/// In-memory room registry. Like `CameraDirectory`, mutations only run on
/// the Presence Coordinator's critical path under its lock.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Set `conn_id` as the room's camera, creating the room if absent.
    /// Replaces any previous camera connection.
    pub fn join_as_camera(&mut self, room_id: &str, conn_id: &str) -> &Room {
        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(room_id));
        room.camera = Some(conn_id.to_string());
        room
    }

    /// Add `conn_id` to the room's viewer set. The caller has already
    /// verified a live CameraRecord exists and policy allows the join, so a
    /// missing room here only happens for the camera-churn case where
    /// viewers outlived the camera.
    pub fn join_as_viewer(&mut self, room_id: &str, conn_id: &str) -> &Room {
        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(room_id));
        room.viewers.insert(conn_id.to_string());
        room
    }

    /// Remove `conn_id` from the camera slot or viewer set. Deletes the room
    /// once it has neither. A camera slot held by a different connection
    /// (the room was taken over) is left untouched.
    pub fn leave(&mut self, room_id: &str, conn_id: &str, was_camera: bool) -> LeaveOutcome {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return LeaveOutcome {
                orphaned_viewers: Vec::new(),
                room_deleted: false,
            };
        };

        let mut orphaned_viewers = Vec::new();
        if was_camera {
            if room.camera.as_deref() == Some(conn_id) {
                room.camera = None;
                orphaned_viewers = room.viewers.iter().cloned().collect();
            }
        } else {
            room.viewers.remove(conn_id);
        }

        let room_deleted = room.is_empty();
        if room_deleted {
            self.rooms.remove(room_id);
        }

        LeaveOutcome {
            orphaned_viewers,
            room_deleted,
        }
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn camera_conn(&self, room_id: &str) -> Option<&str> {
        self.rooms.get(room_id).and_then(|r| r.camera.as_deref())
    }

    pub fn viewer_conns(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|r| r.viewers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_join_creates_room() {
        let mut registry = RoomRegistry::new();
        registry.join_as_camera("camera-a", "conn-1");

        let room = registry.get("camera-a").expect("room exists");
        assert_eq!(room.camera.as_deref(), Some("conn-1"));
        assert!(room.viewers.is_empty());
    }

    #[test]
    fn test_second_camera_join_replaces_slot() {
        let mut registry = RoomRegistry::new();
        registry.join_as_camera("camera-a", "conn-1");
        registry.join_as_camera("camera-a", "conn-2");

        assert_eq!(registry.camera_conn("camera-a"), Some("conn-2"));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_camera_leave_with_no_viewers_deletes_room() {
        let mut registry = RoomRegistry::new();
        registry.join_as_camera("camera-a", "conn-1");

        let outcome = registry.leave("camera-a", "conn-1", true);
        assert!(outcome.room_deleted);
        assert!(outcome.orphaned_viewers.is_empty());
        assert!(registry.get("camera-a").is_none());
    }

    #[test]
    fn test_camera_leave_keeps_room_while_viewers_remain() {
        let mut registry = RoomRegistry::new();
        registry.join_as_camera("camera-a", "conn-1");
        registry.join_as_viewer("camera-a", "conn-2");

        let outcome = registry.leave("camera-a", "conn-1", true);
        assert!(!outcome.room_deleted);
        assert_eq!(outcome.orphaned_viewers, vec!["conn-2".to_string()]);

        // Room survives as viewers-only until the last viewer leaves.
        let outcome = registry.leave("camera-a", "conn-2", false);
        assert!(outcome.room_deleted);
        assert!(registry.get("camera-a").is_none());
    }

    #[test]
    fn test_replaced_camera_leave_does_not_clear_new_slot() {
        let mut registry = RoomRegistry::new();
        registry.join_as_camera("camera-a", "conn-1");
        registry.join_as_camera("camera-a", "conn-2");

        // The stale connection's departure must not evict its replacement.
        let outcome = registry.leave("camera-a", "conn-1", true);
        assert!(!outcome.room_deleted);
        assert!(outcome.orphaned_viewers.is_empty());
        assert_eq!(registry.camera_conn("camera-a"), Some("conn-2"));
    }

    #[test]
    fn test_viewer_leave_from_unknown_room_is_noop() {
        let mut registry = RoomRegistry::new();
        let outcome = registry.leave("camera-a", "conn-1", false);
        assert!(!outcome.room_deleted);
        assert_eq!(registry.room_count(), 0);
    }
}
