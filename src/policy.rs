//! Ownership policy: which identities may view or operate a camera room.
//!
//! Pure functions over identity + directory state, no I/O. Every room-scoped
//! operation re-derives its authorization from these, because ownership of a
//! room can change over a connection's lifetime (the most recent successful
//! camera join for a room wins ownership).

use crate::models::{CameraRecord, Identity};

/// May `identity` view the camera described by `record`?
/// Admins see everything; everyone else only their own cameras.
pub fn can_view_camera(identity: &Identity, record: &CameraRecord) -> bool {
    identity.authenticated
        && (identity.is_admin() || identity.user_id == record.owner_user_id)
}

/// May `identity` publish as the camera for a room currently described by
/// `existing`? A free room id is open to any authenticated user. An occupied
/// room id may only be taken over by its current owner (reconnect) or an
/// admin; a different user attempting to publish under it must fail rather
/// than silently steal the room.
pub fn can_operate_as_camera(identity: &Identity, existing: Option<&CameraRecord>) -> bool {
    if !identity.authenticated {
        return false;
    }
    match existing {
        None => true,
        Some(record) => identity.is_admin() || identity.user_id == record.owner_user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CameraStatus, Role};

    fn identity(user_id: &str, role: Role) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            username: format!("user-{}", user_id),
            role,
            authenticated: true,
        }
    }

    fn record(owner: &str) -> CameraRecord {
        CameraRecord {
            room_id: "camera-front-door".to_string(),
            owner_user_id: owner.to_string(),
            display_name: "Front Door".to_string(),
            device_info: "Test device".to_string(),
            connected_at: chrono::Utc::now(),
            status: CameraStatus::Active,
            conn_id: "conn-1".to_string(),
        }
    }

    #[test]
    fn test_owner_can_view_own_camera() {
        assert!(can_view_camera(&identity("1", Role::User), &record("1")));
    }

    #[test]
    fn test_non_owner_cannot_view() {
        assert!(!can_view_camera(&identity("2", Role::User), &record("1")));
    }

    #[test]
    fn test_admin_can_view_any_camera() {
        assert!(can_view_camera(&identity("99", Role::Admin), &record("1")));
    }

    #[test]
    fn test_unauthenticated_identity_is_denied() {
        let mut id = identity("1", Role::User);
        id.authenticated = false;
        assert!(!can_view_camera(&id, &record("1")));
        assert!(!can_operate_as_camera(&id, None));
    }

    #[test]
    fn test_free_room_is_open_to_any_user() {
        assert!(can_operate_as_camera(&identity("2", Role::User), None));
    }

    #[test]
    fn test_owner_may_take_over_own_room() {
        let existing = record("1");
        assert!(can_operate_as_camera(&identity("1", Role::User), Some(&existing)));
    }

    #[test]
    fn test_non_owner_may_not_take_over_room() {
        let existing = record("1");
        assert!(!can_operate_as_camera(&identity("2", Role::User), Some(&existing)));
    }

    #[test]
    fn test_admin_may_take_over_any_room() {
        let existing = record("1");
        assert!(can_operate_as_camera(&identity("99", Role::Admin), Some(&existing)));
    }
}
