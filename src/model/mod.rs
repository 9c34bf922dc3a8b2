pub mod attendance;
pub mod location;
pub mod notification;
pub mod presence;
pub mod role;
pub mod user;
pub mod zone;
