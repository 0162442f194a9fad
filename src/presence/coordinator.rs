use std::sync::{Arc, Mutex};

use crate::error::{AppError, Result};
use crate::models::{CameraRecord, CameraSummary, Identity};
use crate::policy;
use crate::presence::{CameraDirectory, RoomRegistry};
use crate::ws::{msg_types, ClientHandle, ConnectionsManager, SignalingMessage};

/// Rooms and the camera directory move together: a camera join writes both,
/// a disconnect tears both down. One lock covers every compound
/// read-modify-write so joins and disconnects for the same room cannot
/// interleave.
struct PresenceInner {
    directory: CameraDirectory,
    registry: RoomRegistry,
}

/// Orchestrates join/leave side effects: mutates the camera directory and
/// room registry together, fans out presence updates, and performs cleanup
/// on disconnect. The transport layer never touches the registries directly.
pub struct PresenceCoordinator {
    inner: Mutex<PresenceInner>,
    connections: Arc<ConnectionsManager>,
}

impl PresenceCoordinator {
    pub fn new(connections: Arc<ConnectionsManager>) -> Self {
        Self {
            inner: Mutex::new(PresenceInner {
                directory: CameraDirectory::new(),
                registry: RoomRegistry::new(),
            }),
            connections,
        }
    }

    /// Register `conn_id` as the camera publisher for `room_id`.
    ///
    /// Fails closed without mutating anything if the room is currently owned
    /// by a different user (only the owner or an admin may take over a live
    /// room id). On success the previous record, if any, is replaced, any
    /// viewers left over from a previous camera instance are told the camera
    /// is available again, and everyone receives a freshly filtered camera
    /// list.
    pub fn join_as_camera(
        &self,
        identity: &Identity,
        conn_id: &str,
        room_id: &str,
        camera_name: Option<String>,
        device_info: Option<String>,
    ) -> Result<CameraRecord> {
        if room_id.trim().is_empty() {
            return Err(AppError::InvalidMessage("room_id must not be empty".into()));
        }

        let (record, waiting_viewers) = {
            let mut inner = self.inner.lock().expect("presence lock poisoned");

            if !policy::can_operate_as_camera(identity, inner.directory.get(room_id)) {
                return Err(AppError::AccessDenied(format!(
                    "room {} is owned by another user",
                    room_id
                )));
            }

            let name =
                camera_name.unwrap_or_else(|| format!("Camera {}", room_id));
            let device = device_info.unwrap_or_else(|| "Unknown device".to_string());

            let record = inner.directory.register(
                room_id,
                &identity.user_id,
                &name,
                &device,
                conn_id,
            );
            inner.registry.join_as_camera(room_id, conn_id);

            let waiting_viewers = inner.registry.viewer_conns(room_id);
            (record, waiting_viewers)
        };

        for viewer in waiting_viewers {
            self.connections.send_to(
                &viewer,
                SignalingMessage::new(msg_types::CAMERA_AVAILABLE, serde_json::json!({})),
            );
        }
        self.broadcast_camera_lists();

        tracing::info!(
            room_id = %room_id,
            owner = %identity.user_id,
            conn_id = %conn_id,
            camera = %record.display_name,
            "Camera joined room"
        );

        Ok(record)
    }

    /// Add `conn_id` to the viewer set of `room_id`.
    ///
    /// Fails closed: a room with no live CameraRecord is `NoSuchCamera`
    /// rather than an empty shell the viewer waits in, and a denied join
    /// mutates nothing. On success the new viewer receives its filtered
    /// camera list, plus `camera-available` if the camera connection is
    /// live.
    pub fn join_as_viewer(
        &self,
        identity: &Identity,
        conn_id: &str,
        room_id: &str,
    ) -> Result<()> {
        if room_id.trim().is_empty() {
            return Err(AppError::InvalidMessage("room_id must not be empty".into()));
        }

        let (camera_present, visible) = {
            let mut inner = self.inner.lock().expect("presence lock poisoned");

            let record = inner
                .directory
                .get(room_id)
                .ok_or_else(|| AppError::NoSuchCamera(room_id.to_string()))?;
            if !policy::can_view_camera(identity, record) {
                return Err(AppError::AccessDenied(
                    "you do not have permission to view this camera".to_string(),
                ));
            }

            inner.registry.join_as_viewer(room_id, conn_id);
            let camera_present = inner.registry.camera_conn(room_id).is_some();
            let visible = inner.directory.list_visible_to(identity);
            (camera_present, visible)
        };

        let summaries: Vec<CameraSummary> = visible.iter().map(CameraSummary::from).collect();
        self.connections.send_to(
            conn_id,
            SignalingMessage::new(
                msg_types::CAMERAS_UPDATED,
                serde_json::to_value(&summaries).unwrap_or_default(),
            ),
        );
        if camera_present {
            self.connections.send_to(
                conn_id,
                SignalingMessage::new(msg_types::CAMERA_AVAILABLE, serde_json::json!({})),
            );
        }

        tracing::info!(
            room_id = %room_id,
            user_id = %identity.user_id,
            conn_id = %conn_id,
            "Viewer joined room"
        );

        Ok(())
    }

    /// Tear down whatever `conn_id` held. Best-effort: never fails, partial
    /// cleanup is logged rather than retried since the connection is gone.
    pub fn disconnect(&self, conn_id: &str, room_id: Option<&str>, was_camera: bool) {
        let Some(room_id) = room_id else {
            return;
        };

        let (camera_removed, orphaned_viewers, room_deleted) = {
            let mut inner = self.inner.lock().expect("presence lock poisoned");

            // Only unregister the record if it still points at this
            // connection; a reconnected camera may have replaced it.
            let camera_removed = was_camera
                && inner
                    .directory
                    .get(room_id)
                    .map(|record| record.conn_id == conn_id)
                    .unwrap_or(false)
                && inner.directory.unregister(room_id).is_some();

            let outcome = inner.registry.leave(room_id, conn_id, was_camera);
            (camera_removed, outcome.orphaned_viewers, outcome.room_deleted)
        };

        if camera_removed {
            for viewer in &orphaned_viewers {
                self.connections.send_to(
                    viewer,
                    SignalingMessage::new(
                        msg_types::CAMERA_DISCONNECTED,
                        serde_json::json!({}),
                    ),
                );
            }
            self.broadcast_camera_lists();
        }

        tracing::info!(
            room_id = %room_id,
            conn_id = %conn_id,
            was_camera,
            room_deleted,
            "Connection left room"
        );
    }

    /// Read-only filtered snapshot, shared by the REST listing and the
    /// broadcast path.
    pub fn list_visible_to(&self, identity: &Identity) -> Vec<CameraSummary> {
        let inner = self.inner.lock().expect("presence lock poisoned");
        inner
            .directory
            .list_visible_to(identity)
            .iter()
            .map(CameraSummary::from)
            .collect()
    }

    /// Current directory record for a room, for per-message ownership
    /// re-checks.
    pub fn record_for(&self, room_id: &str) -> Option<CameraRecord> {
        let inner = self.inner.lock().expect("presence lock poisoned");
        inner.directory.get(room_id).cloned()
    }

    /// Connection id of the room's live camera, if any.
    pub fn camera_conn_for(&self, room_id: &str) -> Option<String> {
        let inner = self.inner.lock().expect("presence lock poisoned");
        inner.registry.camera_conn(room_id).map(str::to_string)
    }

    /// Snapshot of the room's viewer connections.
    pub fn viewer_conns_for(&self, room_id: &str) -> Vec<String> {
        let inner = self.inner.lock().expect("presence lock poisoned");
        inner.registry.viewer_conns(room_id)
    }

    pub fn is_viewer_in_room(&self, room_id: &str, conn_id: &str) -> bool {
        let inner = self.inner.lock().expect("presence lock poisoned");
        inner
            .registry
            .get(room_id)
            .map(|room| room.viewers.contains(conn_id))
            .unwrap_or(false)
    }

    pub fn stats(&self) -> PresenceStats {
        let inner = self.inner.lock().expect("presence lock poisoned");
        PresenceStats {
            rooms: inner.registry.room_count(),
            cameras: inner.directory.len(),
            connections: self.connections.client_count(),
        }
    }

    /// Push a per-recipient-filtered camera list to every live connection.
    /// Directory state is snapshotted once under the lock; filtering runs on
    /// the snapshot so a slow receiver cannot hold the lock.
    fn broadcast_camera_lists(&self) {
        let records: Vec<CameraRecord> = {
            let inner = self.inner.lock().expect("presence lock poisoned");
            inner.directory.records()
        };

        for handle in self.connections.snapshot() {
            let recipient = handle_identity(&handle);
            let summaries: Vec<CameraSummary> = records
                .iter()
                .filter(|record| policy::can_view_camera(&recipient, record))
                .map(CameraSummary::from)
                .collect();

            let _ = handle.send(SignalingMessage::new(
                msg_types::CAMERAS_UPDATED,
                serde_json::to_value(&summaries).unwrap_or_default(),
            ));
        }
    }
}

/// Presence counters for the health endpoint.
#[derive(Debug, serde::Serialize)]
pub struct PresenceStats {
    pub rooms: usize,
    pub cameras: usize,
    pub connections: usize,
}

fn handle_identity(handle: &ClientHandle) -> Identity {
    Identity {
        user_id: handle.user_id.clone(),
        username: handle.username.clone(),
        role: handle.role,
        authenticated: true,
    }
}
