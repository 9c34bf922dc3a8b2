use crate::api::error::{ApiError, ApiResult};
use crate::auth::auth::AuthUser;
use crate::model::user::{RoleRequestState, UserProfile};
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequestView {
    pub status: Option<RoleRequestState>,
    pub can_request: bool,
    /// When a rejected user may ask again.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub available_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/api/role-requests",
    responses(
        (status = 201, description = "Admin role requested", body = UserProfile),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already admin, or still in the cooldown after a rejection")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn request_admin_role(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user = state.users.request_admin_role(&auth.user_id).await?;
    Ok(HttpResponse::Created().json(UserProfile::from(&user)))
}

#[utoipa::path(
    get,
    path = "/api/role-requests/status",
    responses(
        (status = 200, description = "Own role request state", body = RoleRequestView),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Roles"
)]
pub async fn role_request_status(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user = state
        .users
        .get(&auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    let cooldown = state.users.check_cooldown(&user).err();
    let pending = user.role_request.status == Some(RoleRequestState::Pending);
    Ok(HttpResponse::Ok().json(RoleRequestView {
        status: user.role_request.status,
        can_request: auth.is_employee() && !pending && cooldown.is_none(),
        available_at: cooldown,
    }))
}
