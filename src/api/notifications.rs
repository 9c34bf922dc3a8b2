use crate::api::error::{ApiError, ApiResult};
use crate::auth::auth::AuthUser;
use crate::model::notification::Notification;
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "Own notifications, newest first", body = [Notification]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let notifications = state.notifications.list(&auth.user_id).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such notification")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    auth: AuthUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if !state.notifications.mark_read(&auth.user_id, &id).await? {
        return Err(ApiError::NotFound("Notification not found"));
    }
    Ok(HttpResponse::Ok().json(json!({"message": "Notification marked as read"})))
}
