use serde::{Deserialize, Serialize};

/// Wrapper for all WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SignalingMessage {
    pub fn new(msg_type: &str, payload: serde_json::Value) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            request_id: None,
            payload,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn error(code: u16, message: &str, request_id: Option<String>) -> Self {
        Self {
            msg_type: "error".to_string(),
            request_id,
            payload: serde_json::json!({
                "code": code,
                "message": message
            }),
        }
    }
}

// ==================== Client -> Server Messages ====================

/// join-room message payload
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoomPayload {
    pub room_id: String,
    pub role: JoinRole,
    #[serde(default)]
    pub camera_name: Option<String>,
    #[serde(default)]
    pub device_info: Option<String>,
}

/// Role requested in a join-room message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRole {
    Camera,
    Viewer,
}

/// offer / answer message payload (SDP blob is opaque to this layer)
#[derive(Debug, Clone, Deserialize)]
pub struct SdpPayload {
    pub target: String,
    #[serde(alias = "offer", alias = "answer")]
    pub sdp: serde_json::Value,
}

/// ice-candidate message payload (candidate structure is opaque)
#[derive(Debug, Clone, Deserialize)]
pub struct IceCandidatePayload {
    pub target: String,
    pub candidate: serde_json::Value,
}

/// request-device-list / request-alert-settings payload
#[derive(Debug, Clone, Deserialize)]
pub struct RoomScopedRequestPayload {
    pub room_id: String,
}

/// device-list message payload (camera -> viewer)
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceListPayload {
    pub target: String,
    pub devices: serde_json::Value,
}

/// switch-device-request payload (viewer -> camera)
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchDeviceRequestPayload {
    pub room_id: String,
    pub device_type: String,
    pub device_id: String,
}

/// device-switched payload (camera -> viewer, async acknowledgment)
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSwitchedPayload {
    pub target: String,
    pub device_type: String,
    pub device_id: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// update-alert-settings payload (viewer -> camera)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAlertSettingsPayload {
    pub room_id: String,
    pub settings: serde_json::Value,
}

/// send-alert-settings-to-viewer payload (camera -> viewer)
#[derive(Debug, Clone, Deserialize)]
pub struct SendAlertSettingsPayload {
    pub target: String,
    pub settings: serde_json::Value,
}

// ==================== Server -> Client Messages ====================

/// viewer-requesting-offer payload (server -> camera)
#[derive(Debug, Clone, Serialize)]
pub struct ViewerRequestingOfferPayload {
    pub viewer_id: String,
}

/// Message types used for dispatch
pub mod msg_types {
    // Client -> Server
    pub const JOIN_ROOM: &str = "join-room";
    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "ice-candidate";
    pub const REQUEST_OFFER: &str = "request-offer";
    pub const REQUEST_DEVICE_LIST: &str = "request-device-list";
    pub const DEVICE_LIST: &str = "device-list";
    pub const SWITCH_DEVICE_REQUEST: &str = "switch-device-request";
    pub const DEVICE_SWITCHED: &str = "device-switched";
    pub const SECURITY_ALERT: &str = "security-alert";
    pub const SECURITY_ALERTS_STATUS: &str = "security-alerts-status";
    pub const UPDATE_ALERT_SETTINGS: &str = "update-alert-settings";
    pub const REQUEST_ALERT_SETTINGS: &str = "request-alert-settings";
    pub const SEND_ALERT_SETTINGS_TO_VIEWER: &str = "send-alert-settings-to-viewer";
    pub const PING: &str = "ping";

    // Server -> Client
    pub const CAMERAS_UPDATED: &str = "cameras-updated";
    pub const CAMERA_AVAILABLE: &str = "camera-available";
    pub const CAMERA_DISCONNECTED: &str = "camera-disconnected";
    pub const VIEWER_REQUESTING_OFFER: &str = "viewer-requesting-offer";
    pub const SECURITY_ALERT_RECEIVED: &str = "security-alert-received";
    pub const SECURITY_ALERTS_STATUS_UPDATE: &str = "security-alerts-status-update";
    pub const ALERT_SETTINGS_UPDATE: &str = "alert-settings-update";
    pub const SEND_CURRENT_ALERT_SETTINGS: &str = "send-current-alert-settings";
    pub const CURRENT_ALERT_SETTINGS: &str = "current-alert-settings";
    pub const ERROR: &str = "error";
    pub const PONG: &str = "pong";
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_envelope_round_trip() {
        let msg = SignalingMessage::new(
            msg_types::JOIN_ROOM,
            serde_json::json!({
                "room_id": "camera-front",
                "role": "camera",
                "camera_name": "Front Door"
            }),
        );

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: SignalingMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.msg_type, "join-room");
        let payload: JoinRoomPayload = serde_json::from_value(parsed.payload).unwrap();
        assert_eq!(payload.room_id, "camera-front");
        assert_eq!(payload.role, JoinRole::Camera);
        assert_eq!(payload.camera_name.as_deref(), Some("Front Door"));
        assert_eq!(payload.device_info, None);
    }

    #[test]
    fn test_error_envelope_shape() {
        let msg = SignalingMessage::error(403, "Access denied: not your camera", None);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["code"], 403);
        assert_eq!(json["payload"]["message"], "Access denied: not your camera");
        assert!(json.get("request_id").is_none());
    }

    #[test]
    fn test_offer_payload_accepts_offer_alias() {
        let value = serde_json::json!({
            "target": "conn-42",
            "offer": { "type": "offer", "sdp": "v=0..." }
        });
        let payload: SdpPayload = serde_json::from_value(value).unwrap();
        assert_eq!(payload.target, "conn-42");
        assert_eq!(payload.sdp["type"], "offer");
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let parsed: SignalingMessage =
            serde_json::from_str(r#"{"type":"request-offer"}"#).unwrap();
        assert_eq!(parsed.msg_type, "request-offer");
        assert!(parsed.payload.is_null());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let value = serde_json::json!({ "room_id": "r", "role": "spectator" });
        assert!(serde_json::from_value::<JoinRoomPayload>(value).is_err());
    }
}
