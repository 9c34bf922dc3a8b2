pub mod provider;
pub mod watcher;

pub use provider::{DeviceLocation, LocationError, LocationProvider, PermissionStatus, read_position};
pub use watcher::{LocationWatcher, WatchEvent, WatchHandle, WatchOptions};
