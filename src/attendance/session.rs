//! Employee attendance sessions.
//!
//! Login starts a [`LocationWatcher`] over the employee's device feed and routes its
//! events into the [`AttendanceService`]; logout stops it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::attendance::service::AttendanceService;
use crate::location::provider::DeviceLocation;
use crate::location::watcher::{LocationWatcher, WatchEvent, WatchHandle, WatchOptions};

pub struct SessionRegistry {
    service: Arc<AttendanceService>,
    options: WatchOptions,
    devices: Mutex<HashMap<String, Arc<DeviceLocation>>>,
    watchers: Mutex<HashMap<String, WatchHandle>>,
}

impl SessionRegistry {
    pub fn new(service: Arc<AttendanceService>, options: WatchOptions) -> Self {
        Self {
            service,
            options,
            devices: Mutex::new(HashMap::new()),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &Arc<AttendanceService> {
        &self.service
    }

    /// The location feed pushed by this user's device, created on first use.
    pub async fn device(&self, user_id: &str) -> Arc<DeviceLocation> {
        let mut devices = self.devices.lock().await;
        devices
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(DeviceLocation::new()))
            .clone()
    }

    /// Starts watching `user_id`. A no-op while a watcher is already running.
    pub async fn start(&self, user_id: &str) {
        let mut watchers = self.watchers.lock().await;
        if watchers.get(user_id).is_some_and(|h| !h.is_finished()) {
            return;
        }

        let device = self.device(user_id).await;
        let watcher = LocationWatcher::new(device, self.options.clone());
        let service = self.service.clone();
        let owner = user_id.to_string();

        let handle = watcher.start(move |event| {
            let service = service.clone();
            let user_id = owner.clone();
            async move {
                let result = match event {
                    WatchEvent::Sample(sample) => service.handle_sample(&user_id, sample).await.map(|_| ()),
                    WatchEvent::PermissionChanged(status) => {
                        service.handle_permission(&user_id, status).await.map(|_| ())
                    }
                };
                if let Err(e) = result {
                    error!(user_id = %user_id, error = %e, "watch event not applied");
                }
            }
        });

        watchers.insert(user_id.to_string(), handle);
        info!(user_id, "attendance session started");
    }

    /// Returns once no further events for `user_id` can be evaluated.
    pub async fn stop(&self, user_id: &str) {
        let handle = self.watchers.lock().await.remove(user_id);
        if let Some(handle) = handle {
            LocationWatcher::stop(handle).await;
            self.service.forget(user_id).await;
            info!(user_id, "attendance session stopped");
        }
    }

    pub async fn is_active(&self, user_id: &str) -> bool {
        self.watchers
            .lock()
            .await
            .get(user_id)
            .is_some_and(|h| !h.is_finished())
    }

    pub async fn stop_all(&self) {
        let handles: Vec<(String, WatchHandle)> = self.watchers.lock().await.drain().collect();
        for (user_id, handle) in handles {
            LocationWatcher::stop(handle).await;
            self.service.forget(&user_id).await;
        }
    }
}
