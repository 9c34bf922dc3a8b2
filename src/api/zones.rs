use crate::api::error::ApiResult;
use crate::auth::auth::AuthUser;
use crate::model::zone::GeofenceZone;
use crate::state::AppState;
use actix_web::{HttpResponse, web};

#[utoipa::path(
    get,
    path = "/api/zones",
    responses(
        (status = 200, description = "Zones assigned to the caller", body = [GeofenceZone]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Zones"
)]
pub async fn my_zones(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let zones = state.zones.for_user(&auth.user_id).await?;
    Ok(HttpResponse::Ok().json(zones))
}
