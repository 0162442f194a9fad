pub mod coordinator;
pub mod directory;
pub mod registry;

pub use coordinator::{PresenceCoordinator, PresenceStats};
pub use directory::CameraDirectory;
pub use registry::{LeaveOutcome, Room, RoomRegistry};
