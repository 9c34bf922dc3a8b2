use std::sync::Arc;

use tokio::sync::Mutex;

use crate::model::notification::Notification;
use crate::storage::{self, KeyValueStore, StorageResult};

fn notifications_key(user_id: &str) -> String {
    format!("notifications:{}", user_id)
}

pub struct NotificationCenter {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl NotificationCenter {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn push(&self, notification: Notification) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let key = notifications_key(&notification.user_id);
        let mut all: Vec<Notification> = storage::get_json(self.kv.as_ref(), &key).await?.unwrap_or_default();
        all.push(notification);
        storage::set_json(self.kv.as_ref(), &key, &all).await
    }

    /// Newest first.
    pub async fn list(&self, user_id: &str) -> StorageResult<Vec<Notification>> {
        let mut all: Vec<Notification> = storage::get_json(self.kv.as_ref(), &notifications_key(user_id))
            .await?
            .unwrap_or_default();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(all)
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        let key = notifications_key(user_id);
        let mut all: Vec<Notification> = storage::get_json(self.kv.as_ref(), &key).await?.unwrap_or_default();
        let Some(found) = all.iter_mut().find(|n| n.id == notification_id) else {
            return Ok(false);
        };
        found.read = true;
        storage::set_json(self.kv.as_ref(), &key, &all).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::notification::NotificationKind;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn lists_newest_first_and_marks_read() {
        let center = NotificationCenter::new(Arc::new(MemoryStore::new()));
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let first = Notification::new("u1", NotificationKind::Attendance, "Checked out", "left", early);
        let second = Notification::new("u1", NotificationKind::System, "Hello", "hi", late);
        center.push(first.clone()).await.unwrap();
        center.push(second.clone()).await.unwrap();

        let listed = center.list("u1").await.unwrap();
        assert_eq!(listed.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec![second.id.as_str(), first.id.as_str()]);

        assert!(center.mark_read("u1", &first.id).await.unwrap());
        assert!(!center.mark_read("u1", "nope").await.unwrap());
        let listed = center.list("u1").await.unwrap();
        assert!(listed.iter().find(|n| n.id == first.id).unwrap().read);
        assert!(center.list("u2").await.unwrap().is_empty());
    }
}
