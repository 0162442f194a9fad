use tokio::sync::mpsc;

use crate::models::{Identity, Role};
use crate::ws::{JoinRole, SignalingMessage};

/// Per-socket session state, owned by the socket task. The identity is
/// verified once at handshake time and cached here for the connection's
/// lifetime; room membership is filled in by a successful join.
#[derive(Debug)]
pub struct WsSessionState {
    pub conn_id: String,
    pub identity: Identity,
    pub room_id: Option<String>,
    pub room_role: Option<JoinRole>,
}

impl WsSessionState {
    pub fn new(conn_id: String, identity: Identity) -> Self {
        Self {
            conn_id,
            identity,
            room_id: None,
            room_role: None,
        }
    }

    pub fn set_joined(&mut self, room_id: String, role: JoinRole) {
        self.room_id = Some(room_id);
        self.room_role = Some(role);
    }

    pub fn is_camera(&self) -> bool {
        self.room_role == Some(JoinRole::Camera)
    }

    pub fn is_viewer(&self) -> bool {
        self.room_role == Some(JoinRole::Viewer)
    }
}

/// Client connection handle for sending messages
#[derive(Clone)]
pub struct ClientHandle {
    pub conn_id: String,
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub sender: mpsc::UnboundedSender<SignalingMessage>,
}

impl ClientHandle {
    pub fn new(
        conn_id: String,
        identity: &Identity,
        sender: mpsc::UnboundedSender<SignalingMessage>,
    ) -> Self {
        Self {
            conn_id,
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            role: identity.role,
            sender,
        }
    }

    pub fn send(
        &self,
        msg: SignalingMessage,
    ) -> Result<(), mpsc::error::SendError<SignalingMessage>> {
        self.sender.send(msg)
    }
}

/// Global connections manager. Flat conn_id -> handle map: signaling relay
/// addresses peers directly by connection id, independent of room scoping.
pub struct ConnectionsManager {
    clients: dashmap::DashMap<String, ClientHandle>,
}

impl ConnectionsManager {
    pub fn new() -> Self {
        Self {
            clients: dashmap::DashMap::new(),
        }
    }

    pub fn add_client(&self, handle: ClientHandle) {
        self.clients.insert(handle.conn_id.clone(), handle);
    }

    pub fn remove_client(&self, conn_id: &str) -> Option<ClientHandle> {
        self.clients.remove(conn_id).map(|(_, v)| v)
    }

    pub fn get_client(&self, conn_id: &str) -> Option<ClientHandle> {
        self.clients.get(conn_id).map(|r| r.clone())
    }

    /// Send to one connection; NoSuchTarget handling is the caller's concern.
    pub fn send_to(&self, conn_id: &str, msg: SignalingMessage) -> bool {
        match self.clients.get(conn_id) {
            Some(client) => client.send(msg).is_ok(),
            None => false,
        }
    }

    /// Snapshot of all live handles, for per-recipient filtered broadcasts.
    pub fn snapshot(&self) -> Vec<ClientHandle> {
        self.clients.iter().map(|r| r.clone()).collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl Default for ConnectionsManager {
    fn default() -> Self {
        Self::new()
    }
}
