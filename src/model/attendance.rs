use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

use crate::model::location::Coordinates;

/// Why the system closed a record without the employee asking.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AutoCheckoutReason {
    LeftGeofence,
    PermissionRevoked,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceState {
    NotCheckedIn,
    CheckedIn,
    CheckedOut,
}

impl AttendanceState {
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            None => AttendanceState::NotCheckedIn,
            Some(r) if r.is_closed() => AttendanceState::CheckedOut,
            Some(_) => AttendanceState::CheckedIn,
        }
    }
}

/// One employee's attendance for one local calendar day.
///
/// Created OPEN at check-in, closed exactly once, never touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub user_id: String,
    #[schema(value_type = String, format = "date", example = "2024-01-01")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub check_in_time: DateTime<Utc>,
    pub check_in_location: Coordinates,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_out_location: Option<Coordinates>,
    pub total_hours: Option<f64>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub manual_checkout: bool,
    #[serde(default)]
    pub auto_checkout: bool,
    pub auto_checkout_reason: Option<AutoCheckoutReason>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.check_out_time.is_some()
    }
}
