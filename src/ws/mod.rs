pub mod handler;
pub mod messages;
pub mod session;

pub use handler::ws_routes;
pub use messages::{
    msg_types, DeviceListPayload, DeviceSwitchedPayload, IceCandidatePayload, JoinRole,
    JoinRoomPayload, RoomScopedRequestPayload, SdpPayload, SendAlertSettingsPayload,
    SignalingMessage, SwitchDeviceRequestPayload, UpdateAlertSettingsPayload,
    ViewerRequestingOfferPayload,
};
pub use session::{ClientHandle, ConnectionsManager, WsSessionState};
