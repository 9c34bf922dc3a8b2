pub mod identity;
pub mod notifications;
pub mod users;
pub mod zones;
