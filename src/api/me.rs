use crate::api::error::{ApiError, ApiResult};
use crate::auth::auth::AuthUser;
use crate::model::user::{NotificationSettings, UserProfile};
use crate::model::zone::GeofenceZone;
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: UserProfile,
    pub assigned_zones: Vec<GeofenceZone>,
    pub session_active: bool,
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user with assigned zones", body = MeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn me(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user = state
        .users
        .get(&auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    let assigned_zones = state.zones.for_user(&user.id).await?;
    let session_active = state.sessions.is_active(&user.id).await;

    Ok(HttpResponse::Ok().json(MeResponse {
        user: UserProfile::from(&user),
        assigned_zones,
        session_active,
    }))
}

#[utoipa::path(
    put,
    path = "/api/me/notification-settings",
    request_body = NotificationSettings,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn update_notification_settings(
    auth: AuthUser,
    body: web::Json<NotificationSettings>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let user = state
        .users
        .update_notification_settings(&auth.user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}
