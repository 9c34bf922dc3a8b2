use crate::api::error::ApiResult;
use crate::attendance::{Decision, Outcome, TodayStatus};
use crate::auth::auth::AuthUser;
use crate::model::attendance::AttendanceRecord;
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use serde::Serialize;
use strum_macros::Display;
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceAction {
    CheckedIn,
    CheckedOut,
    AutoCheckedOut,
    NoAction,
}

/// Result of an attendance command. "Not eligible" outcomes are a 200 with a reason.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub action: AttendanceAction,
    #[schema(example = "outside geofence")]
    pub reason: Option<String>,
    pub record: Option<AttendanceRecord>,
}

impl From<Outcome> for AttendanceResponse {
    fn from(outcome: Outcome) -> Self {
        let action = match outcome.decision {
            Decision::CheckIn => AttendanceAction::CheckedIn,
            Decision::CheckOut(_) => AttendanceAction::CheckedOut,
            Decision::AutoCheckOut(_) => AttendanceAction::AutoCheckedOut,
            Decision::NoAction(_) => AttendanceAction::NoAction,
        };
        AttendanceResponse {
            action,
            reason: outcome.decision.no_action_reason().map(|r| r.to_string()),
            record: outcome.record,
        }
    }
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked in, or the reason it was not possible", body = AttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an employee, or location permission denied"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let device = state.sessions.device(&auth.user_id).await;
    let outcome = state.attendance().check_in(&auth.user_id, device.as_ref()).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(outcome)))
}

/// Geofence-gated check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked out, or the reason it was not possible", body = AttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an employee, or location permission denied"),
        (status = 409, description = "Check-out time precedes check-in time"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let device = state.sessions.device(&auth.user_id).await;
    let outcome = state.attendance().check_out(&auth.user_id, device.as_ref()).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(outcome)))
}

/// Check-out without a geofence check
#[utoipa::path(
    post,
    path = "/api/attendance/manual-checkout",
    responses(
        (status = 200, description = "Checked out, or the reason it was not possible", body = AttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an employee"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn manual_checkout(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let device = state.sessions.device(&auth.user_id).await;
    let outcome = state
        .attendance()
        .manual_checkout(&auth.user_id, device.as_ref())
        .await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's attendance state", body = TodayStatus),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an employee")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let device = state.sessions.device(&auth.user_id).await;
    let status = state.attendance().today(&auth.user_id, device.as_ref()).await?;
    Ok(HttpResponse::Ok().json(status))
}

#[utoipa::path(
    get,
    path = "/api/attendance/history",
    responses(
        (status = 200, description = "Own records, oldest day first", body = [AttendanceRecord]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let records = state.attendance().history(&auth.user_id).await?;
    Ok(HttpResponse::Ok().json(records))
}
