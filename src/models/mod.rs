pub mod camera;
pub mod user;

pub use camera::{CameraRecord, CameraStatus, CameraSummary};
pub use user::{Claims, IceServer, Identity, LoginRequest, LoginResponse, Role, UserAccount};
