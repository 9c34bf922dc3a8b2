pub mod admin;
pub mod attendance;
pub mod device;
pub mod error;
pub mod me;
pub mod notifications;
pub mod roles;
pub mod zones;
