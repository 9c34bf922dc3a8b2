use std::sync::Arc;

use chrono::NaiveDate;

use crate::model::attendance::AttendanceRecord;
use crate::storage::{self, KeyValueStore, StorageResult};

pub const ATTENDANCE_PREFIX: &str = "attendance:";

/// `attendance:{user}:{YYYY-MM-DD}`. User ids are uuids, so they never contain `:`.
pub fn record_key(user_id: &str, date: NaiveDate) -> String {
    format!("{}{}:{}", ATTENDANCE_PREFIX, user_id, date.format("%Y-%m-%d"))
}

/// One record per (user, local day) on top of the shared key-value store.
#[derive(Clone)]
pub struct AttendanceRecordStore {
    kv: Arc<dyn KeyValueStore>,
}

impl AttendanceRecordStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn get(&self, user_id: &str, date: NaiveDate) -> StorageResult<Option<AttendanceRecord>> {
        storage::get_json(self.kv.as_ref(), &record_key(user_id, date)).await
    }

    /// Overwrites the record under its own (user, date) key.
    pub async fn put(&self, record: &AttendanceRecord) -> StorageResult<()> {
        storage::set_json(self.kv.as_ref(), &record_key(&record.user_id, record.date), record).await
    }

    /// Oldest day first.
    pub async fn list_for_user(&self, user_id: &str) -> StorageResult<Vec<AttendanceRecord>> {
        let prefix = format!("{}{}:", ATTENDANCE_PREFIX, user_id);
        let mut records: Vec<AttendanceRecord> = storage::list_json(self.kv.as_ref(), &prefix)
            .await?
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    /// Every record, ordered by day and then by user.
    pub async fn list_all(&self) -> StorageResult<Vec<AttendanceRecord>> {
        let mut records: Vec<AttendanceRecord> = storage::list_json(self.kv.as_ref(), ATTENDANCE_PREFIX)
            .await?
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(records)
    }

    /// Drops every attendance record; returns how many were removed.
    pub async fn clear(&self) -> StorageResult<usize> {
        let keys = self.kv.list_keys(ATTENDANCE_PREFIX).await?;
        self.kv.multi_remove(&keys).await?;
        Ok(keys.len())
    }
}
