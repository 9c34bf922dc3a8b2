use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;
use tokio::sync::Notify;
use utoipa::ToSchema;

use crate::model::location::LocationSample;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, StrumDisplay, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Debug, Display, PartialEq)]
pub enum LocationError {
    #[display(fmt = "location permission denied")]
    PermissionDenied,
    #[display(fmt = "no position fix within {:?}", _0)]
    Timeout(Duration),
}

impl std::error::Error for LocationError {}

/// Source of position fixes and of the foreground location permission.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn permission_status(&self) -> PermissionStatus;

    /// Waits for a fix. Callers bound the wait with [`read_position`].
    async fn current_position(&self) -> Result<LocationSample, LocationError>;

    /// Most recent fix without waiting.
    fn last_known(&self) -> Option<LocationSample>;
}

/// Reads one fix, giving up after `wait`.
pub async fn read_position(
    provider: &dyn LocationProvider,
    wait: Duration,
) -> Result<LocationSample, LocationError> {
    match tokio::time::timeout(wait, provider.current_position()).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout(wait)),
    }
}

#[derive(Debug)]
struct DeviceState {
    permission: PermissionStatus,
    last_fix: Option<LocationSample>,
}

/// Position and permission as pushed by the platform shell running on the device.
///
/// The shell forwards each GPS fix and every permission change; the watcher and the
/// check-in path read from here.
#[derive(Debug)]
pub struct DeviceLocation {
    state: RwLock<DeviceState>,
    fix_reported: Notify,
}

impl Default for DeviceLocation {
    fn default() -> Self {
        Self {
            state: RwLock::new(DeviceState {
                permission: PermissionStatus::Undetermined,
                last_fix: None,
            }),
            fix_reported: Notify::new(),
        }
    }
}

impl DeviceLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_fix(&self, sample: LocationSample) {
        if let Ok(mut state) = self.state.write() {
            // a fix implies the platform let us read the position
            if state.permission == PermissionStatus::Undetermined {
                state.permission = PermissionStatus::Granted;
            }
            state.last_fix = Some(sample);
        }
        self.fix_reported.notify_waiters();
    }

    pub fn report_permission(&self, status: PermissionStatus) {
        if let Ok(mut state) = self.state.write() {
            state.permission = status;
            if status == PermissionStatus::Denied {
                state.last_fix = None;
            }
        }
        self.fix_reported.notify_waiters();
    }
}

#[async_trait]
impl LocationProvider for DeviceLocation {
    async fn permission_status(&self) -> PermissionStatus {
        self.state
            .read()
            .map(|s| s.permission)
            .unwrap_or(PermissionStatus::Undetermined)
    }

    async fn current_position(&self) -> Result<LocationSample, LocationError> {
        loop {
            let notified = self.fix_reported.notified();
            {
                let state = self.state.read().map_err(|_| LocationError::PermissionDenied)?;
                if state.permission == PermissionStatus::Denied {
                    return Err(LocationError::PermissionDenied);
                }
                if let Some(fix) = state.last_fix {
                    return Ok(fix);
                }
            }
            notified.await;
        }
    }

    fn last_known(&self) -> Option<LocationSample> {
        self.state.read().ok().and_then(|s| s.last_fix)
    }
}
