use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::model::zone::GeofenceZone;
use crate::storage::{self, KeyValueStore, StorageResult};

pub const GEOFENCE_PREFIX: &str = "geofences:";

fn zones_key(user_id: &str) -> String {
    format!("{}{}", GEOFENCE_PREFIX, user_id)
}

/// Per-employee zone lists, managed by admins.
pub struct ZoneRegistry {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl ZoneRegistry {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the zones currently assigned to `user_id`.
    pub async fn for_user(&self, user_id: &str) -> StorageResult<Vec<GeofenceZone>> {
        Ok(storage::get_json(self.kv.as_ref(), &zones_key(user_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn assign(&self, user_id: &str, zone: GeofenceZone) -> StorageResult<Vec<GeofenceZone>> {
        let _guard = self.write_lock.lock().await;
        let mut zones = self.for_user(user_id).await?;
        info!(user_id, zone_id = %zone.id, radius = zone.radius, "Assigning geofence");
        zones.push(zone);
        storage::set_json(self.kv.as_ref(), &zones_key(user_id), &zones).await?;
        Ok(zones)
    }

    /// `false` when the zone was not assigned to this user.
    pub async fn remove(&self, user_id: &str, zone_id: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut zones = self.for_user(user_id).await?;
        let before = zones.len();
        zones.retain(|z| z.id != zone_id);
        if zones.len() == before {
            return Ok(false);
        }
        storage::set_json(self.kv.as_ref(), &zones_key(user_id), &zones).await?;
        info!(user_id, zone_id, "Removed geofence");
        Ok(true)
    }
}
