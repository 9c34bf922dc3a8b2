//! Last-known employee positions for the admin map.

use std::sync::Arc;

use crate::model::location::LocationSample;
use crate::model::presence::PresenceEntry;
use crate::storage::{self, KeyValueStore, StorageResult};

pub const PRESENCE_PREFIX: &str = "presence:";

#[derive(Clone)]
pub struct PresenceBroadcaster {
    kv: Arc<dyn KeyValueStore>,
}

impl PresenceBroadcaster {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Last write wins; each employee only ever writes their own entry.
    pub async fn publish(&self, user_id: &str, sample: &LocationSample, is_inside: bool) -> StorageResult<()> {
        let entry = PresenceEntry {
            user_id: user_id.to_string(),
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp: sample.captured_at,
            is_inside,
        };
        storage::set_json(self.kv.as_ref(), &format!("{}{}", PRESENCE_PREFIX, user_id), &entry).await
    }

    pub async fn get(&self, user_id: &str) -> StorageResult<Option<PresenceEntry>> {
        storage::get_json(self.kv.as_ref(), &format!("{}{}", PRESENCE_PREFIX, user_id)).await
    }

    pub async fn list(&self) -> StorageResult<Vec<PresenceEntry>> {
        Ok(storage::list_json(self.kv.as_ref(), PRESENCE_PREFIX)
            .await?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }

    pub async fn clear(&self) -> StorageResult<usize> {
        let keys = self.kv.list_keys(PRESENCE_PREFIX).await?;
        self.kv.multi_remove(&keys).await?;
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn publish_overwrites_previous_entry() {
        let presence = PresenceBroadcaster::new(Arc::new(MemoryStore::new()));
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 5, 0).unwrap();

        presence.publish("u1", &LocationSample::new(37.0, -122.0, t0), true).await.unwrap();
        presence.publish("u1", &LocationSample::new(37.01, -122.0, t1), false).await.unwrap();
        presence.publish("u2", &LocationSample::new(10.0, 10.0, t1), false).await.unwrap();

        let entry = presence.get("u1").await.unwrap().unwrap();
        assert_eq!(entry.latitude, 37.01);
        assert_eq!(entry.timestamp, t1);
        assert!(!entry.is_inside);
        assert_eq!(presence.list().await.unwrap().len(), 2);

        assert_eq!(presence.clear().await.unwrap(), 2);
        assert!(presence.list().await.unwrap().is_empty());
    }
}
