//! Bridge for the platform shell on the employee's device: it forwards position fixes
//! and permission changes, and the session watcher samples them from here.

use crate::api::error::{ApiError, ApiResult};
use crate::auth::auth::AuthUser;
use crate::location::provider::PermissionStatus;
use crate::model::location::{Coordinates, LocationSample};
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportLocation {
    #[schema(example = 37.0)]
    pub latitude: f64,
    #[schema(example = -122.0)]
    pub longitude: f64,
    pub accuracy: Option<f64>,
    /// Defaults to the time the server received the fix.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReportPermission {
    pub status: PermissionStatus,
}

#[utoipa::path(
    post,
    path = "/api/device/location",
    request_body = ReportLocation,
    responses(
        (status = 202, description = "Fix accepted"),
        (status = 400, description = "Coordinates out of range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an employee")
    ),
    security(("bearer_auth" = [])),
    tag = "Device"
)]
pub async fn report_location(
    auth: AuthUser,
    body: web::Json<ReportLocation>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    auth.require_employee()?;
    if !Coordinates::new(body.latitude, body.longitude).is_valid() {
        return Err(ApiError::BadRequest("Coordinates out of range".to_string()));
    }

    let sample = LocationSample {
        latitude: body.latitude,
        longitude: body.longitude,
        accuracy: body.accuracy,
        captured_at: body.captured_at.unwrap_or_else(Utc::now),
    };
    state.sessions.device(&auth.user_id).await.report_fix(sample);
    debug!(user_id = %auth.user_id, "Device fix received");

    Ok(HttpResponse::Accepted().finish())
}

#[utoipa::path(
    post,
    path = "/api/device/permission",
    request_body = ReportPermission,
    responses(
        (status = 202, description = "Permission status accepted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an employee")
    ),
    security(("bearer_auth" = [])),
    tag = "Device"
)]
pub async fn report_permission(
    auth: AuthUser,
    body: web::Json<ReportPermission>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    auth.require_employee()?;
    state
        .sessions
        .device(&auth.user_id)
        .await
        .report_permission(body.status);
    Ok(HttpResponse::Accepted().finish())
}
