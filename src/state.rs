use std::sync::Arc;

use chrono::Duration;

use crate::attendance::{AttendanceRecordStore, AttendanceService, AttendanceStateMachine, SessionRegistry};
use crate::config::Config;
use crate::presence::PresenceBroadcaster;
use crate::services::notifications::NotificationCenter;
use crate::services::users::UserDirectory;
use crate::services::zones::ZoneRegistry;
use crate::storage::KeyValueStore;
use crate::utils::time::{Clock, SystemClock};

/// Everything the handlers share, wired over one key-value store.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserDirectory>,
    pub zones: Arc<ZoneRegistry>,
    pub notifications: Arc<NotificationCenter>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: &Config) -> Self {
        Self::with_clock(kv, config, Arc::new(SystemClock))
    }

    pub fn with_clock(kv: Arc<dyn KeyValueStore>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let zones = Arc::new(ZoneRegistry::new(kv.clone()));
        let notifications = Arc::new(NotificationCenter::new(kv.clone()));
        let users = Arc::new(UserDirectory::new(
            kv.clone(),
            zones.clone(),
            notifications.clone(),
            clock.clone(),
            Duration::hours(config.role_request_cooldown_hours),
        ));

        let service = AttendanceService::new(
            AttendanceRecordStore::new(kv.clone()),
            PresenceBroadcaster::new(kv),
            notifications.clone(),
            users.clone(),
            clock,
            AttendanceStateMachine::new(Duration::seconds(config.max_sample_age_secs)),
            config.location_timeout(),
        );
        let sessions = Arc::new(SessionRegistry::new(Arc::new(service), config.watch_options()));

        Self {
            users,
            zones,
            notifications,
            sessions,
        }
    }

    pub fn attendance(&self) -> &Arc<AttendanceService> {
        self.sessions.service()
    }
}
