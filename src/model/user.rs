use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoleRequestState {
    Pending,
    Rejected,
    Approved,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequestStatus {
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_requested: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_rejected: Option<DateTime<Utc>>,
    pub status: Option<RoleRequestState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub attendance_reminders: bool,
    pub approval_alerts: bool,
    pub system_updates: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            attendance_reminders: true,
            approval_alerts: true,
            system_updates: true,
        }
    }
}

/// Stored user profile. `password` holds the argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub department: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub role_request: RoleRequestStatus,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
    pub created_at: DateTime<Utc>,
}

/// What the API returns about a user; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[schema(example = "jane@company.com")]
    pub email: String,
    pub name: String,
    pub department: String,
    pub role: Role,
    pub role_request: RoleRequestStatus,
    pub notification_settings: NotificationSettings,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            name: u.name.clone(),
            department: u.department.clone(),
            role: u.role,
            role_request: u.role_request.clone(),
            notification_settings: u.notification_settings.clone(),
        }
    }
}
