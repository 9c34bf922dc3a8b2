use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::role::Role;
use crate::model::zone::GeofenceZone;
use crate::storage::StorageResult;

/// Who is acting, as the attendance core sees it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub assigned_zones: Vec<GeofenceZone>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when the user no longer exists.
    async fn current_user(&self, user_id: &str) -> StorageResult<Option<CurrentUser>>;
}
