use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::policy;
use crate::redis::ActivityEntry;
use crate::state::AppState;
use crate::ws::{
    msg_types, ClientHandle, DeviceListPayload, DeviceSwitchedPayload, IceCandidatePayload,
    JoinRole, JoinRoomPayload, RoomScopedRequestPayload, SdpPayload, SendAlertSettingsPayload,
    SignalingMessage, SwitchDeviceRequestPayload, UpdateAlertSettingsPayload,
    ViewerRequestingOfferPayload, WsSessionState,
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQueryParams {
    pub token: String,
}

/// WebSocket routes
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

/// WebSocket upgrade handler. The token is verified before the upgrade;
/// a bad credential refuses the connection outright.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsQueryParams>,
) -> Result<Response> {
    let identity = state.auth.verify(&params.token)?;
    if !identity.authenticated {
        return Err(AppError::AuthRequired);
    }

    tracing::info!(
        user_id = %identity.user_id,
        username = %identity.username,
        "WebSocket upgrade request"
    );

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, identity: crate::models::Identity) {
    let conn_id = Uuid::new_v4().to_string();

    tracing::info!(
        conn_id = %conn_id,
        user_id = %identity.user_id,
        "WebSocket connected"
    );

    // Create message channel for sending to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<SignalingMessage>();

    let mut session = WsSessionState::new(conn_id.clone(), identity.clone());
    state
        .connections
        .add_client(ClientHandle::new(conn_id.clone(), &identity, tx));

    // Split socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for sending messages to client
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Process incoming messages
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_message(&text, &mut session, &state).await {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Malformed message");
                    state.connections.send_to(
                        &conn_id,
                        SignalingMessage::error(e.code(), &e.to_string(), None),
                    );
                }
            }
            Ok(Message::Ping(_)) => {
                tracing::trace!(conn_id = %conn_id, "Ping received");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close received");
                break;
            }
            Err(e) => {
                tracing::error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    tracing::info!(
        conn_id = %conn_id,
        user_id = %identity.user_id,
        "WebSocket disconnected, cleaning up"
    );

    // Remove the send handle first so no relay processed after this point
    // can address the dead connection, then tear down presence.
    state.connections.remove_client(&conn_id);
    let was_camera = session.is_camera();
    state
        .presence
        .disconnect(&conn_id, session.room_id.as_deref(), was_camera);

    if was_camera {
        if let Some(room_id) = &session.room_id {
            state.users.log_activity_bg(
                ActivityEntry::new("camera-disconnected")
                    .with_user(&identity.user_id, &identity.username)
                    .with_room(room_id),
            );
        }
    }

    send_task.abort();
}

/// Parse and dispatch one incoming envelope. Dispatch failures are reported
/// back to the sender only, with the request id echoed; a parse failure
/// bubbles up (no request id to echo).
async fn handle_message(
    text: &str,
    session: &mut WsSessionState,
    state: &AppState,
) -> Result<()> {
    let msg: SignalingMessage = serde_json::from_str(text)?;
    let request_id = msg.request_id.clone();

    tracing::debug!(
        msg_type = %msg.msg_type,
        conn_id = %session.conn_id,
        "Received message"
    );

    if let Err(e) = dispatch(msg, session, state).await {
        tracing::debug!(
            conn_id = %session.conn_id,
            error = %e,
            "Message rejected"
        );
        state.connections.send_to(
            &session.conn_id,
            SignalingMessage::error(e.code(), &e.to_string(), request_id),
        );
    }

    Ok(())
}

async fn dispatch(
    msg: SignalingMessage,
    session: &mut WsSessionState,
    state: &AppState,
) -> Result<()> {
    let request_id = msg.request_id.clone();

    match msg.msg_type.as_str() {
        msg_types::JOIN_ROOM => handle_join_room(msg.payload, session, state),
        msg_types::OFFER | msg_types::ANSWER | msg_types::ICE_CANDIDATE => {
            handle_signal_forward(&msg.msg_type, msg.payload, session, state)
        }
        msg_types::REQUEST_OFFER => handle_request_offer(session, state),
        msg_types::REQUEST_DEVICE_LIST => {
            let payload: RoomScopedRequestPayload = serde_json::from_value(msg.payload.clone())?;
            forward_viewer_to_camera(
                msg_types::REQUEST_DEVICE_LIST,
                &payload.room_id,
                msg.payload,
                session,
                state,
            )
        }
        msg_types::SWITCH_DEVICE_REQUEST => {
            let payload: SwitchDeviceRequestPayload =
                serde_json::from_value(msg.payload.clone())?;
            forward_viewer_to_camera(
                msg_types::SWITCH_DEVICE_REQUEST,
                &payload.room_id,
                msg.payload,
                session,
                state,
            )
        }
        msg_types::UPDATE_ALERT_SETTINGS => {
            let payload: UpdateAlertSettingsPayload =
                serde_json::from_value(msg.payload.clone())?;
            forward_viewer_to_camera(
                msg_types::ALERT_SETTINGS_UPDATE,
                &payload.room_id,
                msg.payload,
                session,
                state,
            )
        }
        msg_types::REQUEST_ALERT_SETTINGS => {
            let payload: RoomScopedRequestPayload = serde_json::from_value(msg.payload.clone())?;
            let request = serde_json::to_value(ViewerRequestingOfferPayload {
                viewer_id: session.conn_id.clone(),
            })?;
            forward_viewer_to_camera(
                msg_types::SEND_CURRENT_ALERT_SETTINGS,
                &payload.room_id,
                request,
                session,
                state,
            )
        }
        msg_types::DEVICE_LIST => {
            let payload: DeviceListPayload = serde_json::from_value(msg.payload.clone())?;
            forward_camera_to_viewer(
                msg_types::DEVICE_LIST,
                &payload.target,
                msg.payload,
                session,
                state,
            )
        }
        msg_types::DEVICE_SWITCHED => {
            let payload: DeviceSwitchedPayload = serde_json::from_value(msg.payload.clone())?;
            forward_camera_to_viewer(
                msg_types::DEVICE_SWITCHED,
                &payload.target,
                msg.payload,
                session,
                state,
            )
        }
        msg_types::SEND_ALERT_SETTINGS_TO_VIEWER => {
            let payload: SendAlertSettingsPayload = serde_json::from_value(msg.payload.clone())?;
            forward_camera_to_viewer(
                msg_types::CURRENT_ALERT_SETTINGS,
                &payload.target,
                msg.payload,
                session,
                state,
            )
        }
        msg_types::SECURITY_ALERT => broadcast_camera_to_room(
            msg_types::SECURITY_ALERT_RECEIVED,
            msg.payload,
            session,
            state,
        ),
        msg_types::SECURITY_ALERTS_STATUS => broadcast_camera_to_room(
            msg_types::SECURITY_ALERTS_STATUS_UPDATE,
            msg.payload,
            session,
            state,
        ),
        msg_types::PING => {
            state.connections.send_to(
                &session.conn_id,
                SignalingMessage::new(msg_types::PONG, serde_json::json!({}))
                    .with_request_id(request_id),
            );
            Ok(())
        }
        _ => {
            tracing::warn!(msg_type = %msg.msg_type, "Unknown message type");
            Err(AppError::InvalidMessage(format!(
                "unknown message type {}",
                msg.msg_type
            )))
        }
    }
}

/// Handle join-room: run the ownership policy, mutate presence, and record
/// room membership on the session only after the join succeeded.
fn handle_join_room(
    payload: serde_json::Value,
    session: &mut WsSessionState,
    state: &AppState,
) -> Result<()> {
    ensure_authenticated(session)?;

    if session.room_id.is_some() {
        return Err(AppError::InvalidMessage(
            "connection has already joined a room".to_string(),
        ));
    }

    let join: JoinRoomPayload = serde_json::from_value(payload)?;

    match join.role {
        JoinRole::Camera => {
            state.presence.join_as_camera(
                &session.identity,
                &session.conn_id,
                &join.room_id,
                join.camera_name,
                join.device_info,
            )?;
            session.set_joined(join.room_id.clone(), JoinRole::Camera);

            state.users.log_activity_bg(
                ActivityEntry::new("camera-connected")
                    .with_user(&session.identity.user_id, &session.identity.username)
                    .with_room(&join.room_id),
            );
        }
        JoinRole::Viewer => {
            state
                .presence
                .join_as_viewer(&session.identity, &session.conn_id, &join.room_id)?;
            session.set_joined(join.room_id.clone(), JoinRole::Viewer);

            state.users.log_activity_bg(
                ActivityEntry::new("viewer-joined")
                    .with_user(&session.identity.user_id, &session.identity.username)
                    .with_room(&join.room_id),
            );
        }
    }

    Ok(())
}

/// Point-to-point forward of offer / answer / ice-candidate. The SDP blob or
/// candidate structure is passed through opaquely; only the target address
/// and the sender's standing in its room are examined.
fn handle_signal_forward(
    msg_type: &str,
    payload: serde_json::Value,
    session: &WsSessionState,
    state: &AppState,
) -> Result<()> {
    ensure_authenticated(session)?;

    let target = match msg_type {
        msg_types::ICE_CANDIDATE => {
            serde_json::from_value::<IceCandidatePayload>(payload.clone())?.target
        }
        _ => serde_json::from_value::<SdpPayload>(payload.clone())?.target,
    };

    relay_guard(session, state)?;

    if !state
        .connections
        .send_to(&target, SignalingMessage::new(msg_type, with_sender(payload, &session.conn_id)))
    {
        return Err(AppError::NoSuchTarget(target));
    }

    Ok(())
}

/// request-offer: viewer asks its room's camera to produce an offer,
/// addressed back via the viewer's connection id.
fn handle_request_offer(session: &WsSessionState, state: &AppState) -> Result<()> {
    ensure_authenticated(session)?;

    if !session.is_viewer() {
        return Err(AppError::InvalidMessage(
            "only viewers may request offers".to_string(),
        ));
    }
    relay_guard(session, state)?;

    let room_id = session.room_id.as_deref().unwrap_or_default();
    let camera_conn = state
        .presence
        .camera_conn_for(room_id)
        .ok_or_else(|| AppError::NoSuchCamera(room_id.to_string()))?;

    let payload = serde_json::to_value(ViewerRequestingOfferPayload {
        viewer_id: session.conn_id.clone(),
    })?;

    if !state
        .connections
        .send_to(&camera_conn, SignalingMessage::new(msg_types::VIEWER_REQUESTING_OFFER, payload))
    {
        return Err(AppError::NoSuchTarget(camera_conn));
    }

    Ok(())
}

/// Viewer -> camera forwarding for device and alert-settings requests. The
/// room named in the payload must be the room the viewer joined, and the
/// viewer must still pass the ownership check against the room's current
/// record.
fn forward_viewer_to_camera(
    out_type: &str,
    room_id: &str,
    payload: serde_json::Value,
    session: &WsSessionState,
    state: &AppState,
) -> Result<()> {
    ensure_authenticated(session)?;

    if !session.is_viewer() {
        return Err(AppError::InvalidMessage(
            "only viewers may send this message".to_string(),
        ));
    }
    if session.room_id.as_deref() != Some(room_id) {
        return Err(AppError::AccessDenied(
            "message is scoped to a room this connection has not joined".to_string(),
        ));
    }
    relay_guard(session, state)?;

    let camera_conn = state
        .presence
        .camera_conn_for(room_id)
        .ok_or_else(|| AppError::NoSuchCamera(room_id.to_string()))?;

    if !state
        .connections
        .send_to(&camera_conn, SignalingMessage::new(out_type, with_sender(payload, &session.conn_id)))
    {
        return Err(AppError::NoSuchTarget(camera_conn));
    }

    Ok(())
}

/// Camera -> viewer forwarding for device lists, switch acknowledgments and
/// alert settings.
fn forward_camera_to_viewer(
    out_type: &str,
    target: &str,
    payload: serde_json::Value,
    session: &WsSessionState,
    state: &AppState,
) -> Result<()> {
    ensure_authenticated(session)?;

    if !session.is_camera() {
        return Err(AppError::InvalidMessage(
            "only cameras may send this message".to_string(),
        ));
    }
    relay_guard(session, state)?;

    if !state
        .connections
        .send_to(target, SignalingMessage::new(out_type, with_sender(payload, &session.conn_id)))
    {
        return Err(AppError::NoSuchTarget(target.to_string()));
    }

    Ok(())
}

/// Camera -> all viewers of its room (security alerts and alert status).
fn broadcast_camera_to_room(
    out_type: &str,
    payload: serde_json::Value,
    session: &WsSessionState,
    state: &AppState,
) -> Result<()> {
    ensure_authenticated(session)?;

    if !session.is_camera() {
        return Err(AppError::InvalidMessage(
            "only cameras may broadcast alerts".to_string(),
        ));
    }
    relay_guard(session, state)?;

    let room_id = session.room_id.as_deref().unwrap_or_default();
    let payload = with_sender(payload, &session.conn_id);
    for viewer in state.presence.viewer_conns_for(room_id) {
        state
            .connections
            .send_to(&viewer, SignalingMessage::new(out_type, payload.clone()));
    }

    Ok(())
}

fn ensure_authenticated(session: &WsSessionState) -> Result<()> {
    if !session.identity.authenticated {
        return Err(AppError::AuthRequired);
    }
    Ok(())
}

/// Re-derive the sender's authorization from current directory state. The
/// identity was verified once at handshake; the ownership decision is
/// re-made per message because the room's record may have been replaced
/// since the sender joined.
fn relay_guard(session: &WsSessionState, state: &AppState) -> Result<()> {
    let room_id = session
        .room_id
        .as_deref()
        .ok_or_else(|| AppError::InvalidMessage("join a room first".to_string()))?;

    let record = state
        .presence
        .record_for(room_id)
        .ok_or_else(|| AppError::NoSuchCamera(room_id.to_string()))?;

    let allowed = match session.room_role {
        Some(JoinRole::Camera) => {
            session.identity.is_admin() || record.owner_user_id == session.identity.user_id
        }
        Some(JoinRole::Viewer) => policy::can_view_camera(&session.identity, &record),
        None => false,
    };

    if !allowed {
        return Err(AppError::AccessDenied(
            "room ownership has changed".to_string(),
        ));
    }
    Ok(())
}

fn with_sender(mut payload: serde_json::Value, conn_id: &str) -> serde_json::Value {
    if let Some(obj) = payload.as_object_mut() {
        obj.insert(
            "sender".to_string(),
            serde_json::Value::String(conn_id.to_string()),
        );
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::config::Config;
    use crate::models::{Identity, Role};
    use crate::redis::UserRepository;
    use tokio::sync::mpsc;

    fn test_config() -> Config {
        Config {
            server_host: "localhost".to_string(),
            server_port: 8080,
            redis_url: "redis://localhost:6399".to_string(),
            jwt_secret: "test-secret-key".to_string(),
            jwt_expiry_seconds: 900,
            max_login_attempts: 5,
            lockout_window_seconds: 300,
            activity_log_max_entries: 1000,
            stun_server: "stun:stun.l.google.com:19302".to_string(),
            turn_server: None,
            turn_secret: None,
            turn_credential_ttl_seconds: 3600,
            admin_username: None,
            admin_password: None,
        }
    }

    fn test_state() -> AppState {
        let config = test_config();
        let auth = AuthService::new(&config);
        // The pool is lazy; relay paths never touch Redis, and background
        // activity writes fail quietly in tests.
        let pool = crate::redis::create_pool(&config).expect("lazy pool");
        let users = UserRepository::new(pool, config.activity_log_max_entries);
        AppState::new(config, auth, users)
    }

    fn identity(user_id: &str, role: Role) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            username: format!("user-{}", user_id),
            role,
            authenticated: true,
        }
    }

    fn connect(
        state: &AppState,
        conn_id: &str,
        identity: &Identity,
    ) -> mpsc::UnboundedReceiver<SignalingMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .connections
            .add_client(ClientHandle::new(conn_id.to_string(), identity, tx));
        rx
    }

    fn join_camera(state: &AppState, session: &mut WsSessionState, room_id: &str) {
        handle_join_room(
            serde_json::json!({
                "room_id": room_id,
                "role": "camera",
                "camera_name": "Front Door"
            }),
            session,
            state,
        )
        .expect("camera join");
    }

    fn join_viewer(state: &AppState, session: &mut WsSessionState, room_id: &str) {
        handle_join_room(
            serde_json::json!({ "room_id": room_id, "role": "viewer" }),
            session,
            state,
        )
        .expect("viewer join");
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SignalingMessage>) -> Vec<SignalingMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_unauthenticated_sender_cannot_relay() {
        let state = test_state();
        let mut bad = identity("1", Role::User);
        bad.authenticated = false;

        let _rx = connect(&state, "conn-bad", &bad);
        let target_identity = identity("2", Role::User);
        let mut target_rx = connect(&state, "conn-target", &target_identity);

        let session = WsSessionState::new("conn-bad".to_string(), bad);
        let result = handle_signal_forward(
            msg_types::OFFER,
            serde_json::json!({ "target": "conn-target", "offer": { "sdp": "v=0" } }),
            &session,
            &state,
        );

        assert!(matches!(result, Err(AppError::AuthRequired)));
        assert!(drain(&mut target_rx).is_empty());
    }

    #[tokio::test]
    async fn test_offer_is_forwarded_with_sender() {
        let state = test_state();
        let owner = identity("1", Role::User);
        let mut cam_rx = connect(&state, "cam-1", &owner);
        let mut view_rx = connect(&state, "view-1", &owner);

        let mut cam_session = WsSessionState::new("cam-1".to_string(), owner.clone());
        join_camera(&state, &mut cam_session, "camera-a");
        let mut view_session = WsSessionState::new("view-1".to_string(), owner.clone());
        join_viewer(&state, &mut view_session, "camera-a");
        drain(&mut cam_rx);
        drain(&mut view_rx);

        handle_signal_forward(
            msg_types::OFFER,
            serde_json::json!({ "target": "view-1", "offer": { "type": "offer", "sdp": "v=0" } }),
            &cam_session,
            &state,
        )
        .expect("offer forward");

        let received = drain(&mut view_rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].msg_type, msg_types::OFFER);
        assert_eq!(received[0].payload["sender"], "cam-1");
        assert_eq!(received[0].payload["offer"]["sdp"], "v=0");
    }

    #[tokio::test]
    async fn test_relay_to_dead_target_reports_no_such_target() {
        let state = test_state();
        let owner = identity("1", Role::User);
        let _cam_rx = connect(&state, "cam-1", &owner);

        let mut cam_session = WsSessionState::new("cam-1".to_string(), owner);
        join_camera(&state, &mut cam_session, "camera-a");

        let result = handle_signal_forward(
            msg_types::ICE_CANDIDATE,
            serde_json::json!({ "target": "conn-gone", "candidate": {} }),
            &cam_session,
            &state,
        );

        assert!(matches!(result, Err(AppError::NoSuchTarget(t)) if t == "conn-gone"));
    }

    #[tokio::test]
    async fn test_request_offer_reaches_camera() {
        let state = test_state();
        let owner = identity("1", Role::User);
        let mut cam_rx = connect(&state, "cam-1", &owner);
        let mut view_rx = connect(&state, "view-1", &owner);

        let mut cam_session = WsSessionState::new("cam-1".to_string(), owner.clone());
        join_camera(&state, &mut cam_session, "camera-a");
        let mut view_session = WsSessionState::new("view-1".to_string(), owner.clone());
        join_viewer(&state, &mut view_session, "camera-a");
        drain(&mut cam_rx);
        drain(&mut view_rx);

        handle_request_offer(&view_session, &state).expect("request offer");

        let received = drain(&mut cam_rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].msg_type, msg_types::VIEWER_REQUESTING_OFFER);
        assert_eq!(received[0].payload["viewer_id"], "view-1");
    }

    #[tokio::test]
    async fn test_security_alert_broadcasts_to_room_viewers_only() {
        let state = test_state();
        let owner = identity("1", Role::User);
        let admin = identity("99", Role::Admin);
        let mut cam_rx = connect(&state, "cam-1", &owner);
        let mut view_rx = connect(&state, "view-1", &admin);
        let mut outsider_rx = connect(&state, "outsider", &owner);

        let mut cam_session = WsSessionState::new("cam-1".to_string(), owner.clone());
        join_camera(&state, &mut cam_session, "camera-a");
        let mut view_session = WsSessionState::new("view-1".to_string(), admin.clone());
        join_viewer(&state, &mut view_session, "camera-a");
        drain(&mut cam_rx);
        drain(&mut view_rx);
        drain(&mut outsider_rx);

        broadcast_camera_to_room(
            msg_types::SECURITY_ALERT_RECEIVED,
            serde_json::json!({ "kind": "motion", "level": "high" }),
            &cam_session,
            &state,
        )
        .expect("alert broadcast");

        let received = drain(&mut view_rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].msg_type, msg_types::SECURITY_ALERT_RECEIVED);
        assert_eq!(received[0].payload["kind"], "motion");
        assert!(drain(&mut outsider_rx).is_empty());
        assert!(drain(&mut cam_rx).is_empty());
    }

    #[tokio::test]
    async fn test_relay_denied_after_ownership_change() {
        let state = test_state();
        let owner = identity("1", Role::User);
        let admin = identity("99", Role::Admin);
        let mut old_cam_rx = connect(&state, "cam-1", &owner);
        let _new_cam_rx = connect(&state, "cam-2", &admin);
        let mut view_rx = connect(&state, "view-1", &admin);

        let mut cam_session = WsSessionState::new("cam-1".to_string(), owner.clone());
        join_camera(&state, &mut cam_session, "camera-a");
        let mut view_session = WsSessionState::new("view-1".to_string(), admin.clone());
        join_viewer(&state, &mut view_session, "camera-a");

        // An admin takes the room over; the original user's camera
        // connection loses its standing mid-session.
        let mut admin_cam_session = WsSessionState::new("cam-2".to_string(), admin.clone());
        join_camera(&state, &mut admin_cam_session, "camera-a");
        drain(&mut old_cam_rx);
        drain(&mut view_rx);

        let result = handle_signal_forward(
            msg_types::OFFER,
            serde_json::json!({ "target": "view-1", "offer": { "sdp": "v=0" } }),
            &cam_session,
            &state,
        );

        assert!(matches!(result, Err(AppError::AccessDenied(_))));
        assert!(drain(&mut view_rx).is_empty());
    }

    #[tokio::test]
    async fn test_viewer_scoped_request_must_match_joined_room() {
        let state = test_state();
        let owner = identity("1", Role::User);
        let mut cam_rx = connect(&state, "cam-1", &owner);
        let _view_rx = connect(&state, "view-1", &owner);

        let mut cam_session = WsSessionState::new("cam-1".to_string(), owner.clone());
        join_camera(&state, &mut cam_session, "camera-a");
        let mut view_session = WsSessionState::new("view-1".to_string(), owner.clone());
        join_viewer(&state, &mut view_session, "camera-a");
        drain(&mut cam_rx);

        let result = forward_viewer_to_camera(
            msg_types::REQUEST_DEVICE_LIST,
            "camera-other",
            serde_json::json!({ "room_id": "camera-other" }),
            &view_session,
            &state,
        );

        assert!(matches!(result, Err(AppError::AccessDenied(_))));
        assert!(drain(&mut cam_rx).is_empty());
    }

    #[tokio::test]
    async fn test_device_switch_round_trip() {
        let state = test_state();
        let owner = identity("1", Role::User);
        let mut cam_rx = connect(&state, "cam-1", &owner);
        let mut view_rx = connect(&state, "view-1", &owner);

        let mut cam_session = WsSessionState::new("cam-1".to_string(), owner.clone());
        join_camera(&state, &mut cam_session, "camera-a");
        let mut view_session = WsSessionState::new("view-1".to_string(), owner.clone());
        join_viewer(&state, &mut view_session, "camera-a");
        drain(&mut cam_rx);
        drain(&mut view_rx);

        forward_viewer_to_camera(
            msg_types::SWITCH_DEVICE_REQUEST,
            "camera-a",
            serde_json::json!({
                "room_id": "camera-a",
                "device_type": "video",
                "device_id": "front-lens"
            }),
            &view_session,
            &state,
        )
        .expect("switch request");

        let to_camera = drain(&mut cam_rx);
        assert_eq!(to_camera.len(), 1);
        assert_eq!(to_camera[0].msg_type, msg_types::SWITCH_DEVICE_REQUEST);
        assert_eq!(to_camera[0].payload["device_id"], "front-lens");

        forward_camera_to_viewer(
            msg_types::DEVICE_SWITCHED,
            "view-1",
            serde_json::json!({
                "target": "view-1",
                "device_type": "video",
                "device_id": "front-lens",
                "success": true
            }),
            &cam_session,
            &state,
        )
        .expect("switch ack");

        let to_viewer = drain(&mut view_rx);
        assert_eq!(to_viewer.len(), 1);
        assert_eq!(to_viewer[0].msg_type, msg_types::DEVICE_SWITCHED);
        assert_eq!(to_viewer[0].payload["success"], true);
    }

    #[tokio::test]
    async fn test_second_join_is_rejected() {
        let state = test_state();
        let owner = identity("1", Role::User);
        let _cam_rx = connect(&state, "cam-1", &owner);

        let mut cam_session = WsSessionState::new("cam-1".to_string(), owner.clone());
        join_camera(&state, &mut cam_session, "camera-a");

        let result = handle_join_room(
            serde_json::json!({ "room_id": "camera-b", "role": "camera" }),
            &mut cam_session,
            &state,
        );
        assert!(matches!(result, Err(AppError::InvalidMessage(_))));
    }
}
