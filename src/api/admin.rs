use crate::api::error::{ApiError, ApiResult};
use crate::auth::auth::AuthUser;
use crate::auth::jwt::generate_invite_token;
use crate::config::Config;
use crate::model::attendance::AttendanceRecord;
use crate::model::presence::PresenceEntry;
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::model::zone::GeofenceZone;
use crate::services::users::{AdminInvitation, IdentityError, RoleAuditEntry};
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateZone {
    #[schema(example = "Head office")]
    pub name: String,
    #[schema(example = 37.0)]
    pub latitude: f64,
    #[schema(example = -122.0)]
    pub longitude: f64,
    #[schema(example = 100.0)]
    pub radius: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangeRole {
    pub role: Role,
}

#[derive(Deserialize, ToSchema)]
pub struct InviteAdmin {
    #[schema(example = "new.admin@company.com", format = "email")]
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct InvitationResponse {
    pub token: String,
    pub invitation: AdminInvitation,
}

#[utoipa::path(
    get,
    path = "/api/admin/employees",
    responses(
        (status = 200, description = "All employees", body = [UserProfile]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_employees(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let employees: Vec<UserProfile> = state
        .users
        .list(Some(Role::Employee))
        .await?
        .iter()
        .map(UserProfile::from)
        .collect();
    Ok(HttpResponse::Ok().json(employees))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = String, Path, description = "User id")),
    request_body = ChangeRole,
    responses(
        (status = 200, description = "Role changed", body = UserProfile),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn change_role(
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<ChangeRole>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();
    let user = state
        .users
        .change_user_role(&auth.user_id, &user_id, body.role)
        .await?;
    if !user.role.tracks_attendance() {
        state.sessions.stop(&user.id).await;
    }
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

#[utoipa::path(
    get,
    path = "/api/admin/employees/{id}/zones",
    params(("id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Zones assigned to the employee", body = [GeofenceZone]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_zones(
    auth: AuthUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let zones = state.zones.for_user(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(zones))
}

#[utoipa::path(
    post,
    path = "/api/admin/employees/{id}/zones",
    params(("id" = String, Path, description = "Employee id")),
    request_body = CreateZone,
    responses(
        (status = 201, description = "Zone assigned; returns all zones of the employee", body = [GeofenceZone]),
        (status = 400, description = "Coordinates or radius out of range"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn assign_zone(
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<CreateZone>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();
    if state.users.get(&user_id).await?.is_none() {
        return Err(ApiError::NotFound("Employee not found"));
    }

    let body = body.into_inner();
    let zone = GeofenceZone::new(body.name, body.latitude, body.longitude, body.radius)?;
    let zones = state.zones.assign(&user_id, zone).await?;
    info!(admin = %auth.user_id, user_id = %user_id, count = zones.len(), "Zone assigned");
    Ok(HttpResponse::Created().json(zones))
}

#[utoipa::path(
    delete,
    path = "/api/admin/employees/{id}/zones/{zone_id}",
    params(
        ("id" = String, Path, description = "Employee id"),
        ("zone_id" = String, Path, description = "Zone id")
    ),
    responses(
        (status = 204, description = "Zone removed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No such zone for this employee")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn remove_zone(
    auth: AuthUser,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let (user_id, zone_id) = path.into_inner();
    if !state.zones.remove(&user_id, &zone_id).await? {
        return Err(ApiError::NotFound("Zone not found"));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/admin/attendance",
    responses(
        (status = 200, description = "Every attendance record, by day then employee", body = [AttendanceRecord]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_attendance(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let records = state.attendance().records().list_all().await?;
    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    delete,
    path = "/api/admin/attendance",
    responses(
        (status = 200, description = "All attendance records removed"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn clear_attendance(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let removed = state.attendance().records().clear().await?;
    info!(admin = %auth.user_id, removed, "Attendance records cleared");
    Ok(HttpResponse::Ok().json(json!({"removed": removed})))
}

#[utoipa::path(
    get,
    path = "/api/admin/presence",
    responses(
        (status = 200, description = "Last known position of each employee", body = [PresenceEntry]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_presence(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let entries = state.attendance().presence().list().await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[utoipa::path(
    delete,
    path = "/api/admin/presence",
    responses(
        (status = 200, description = "All presence entries removed"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn clear_presence(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let removed = state.attendance().presence().clear().await?;
    info!(admin = %auth.user_id, removed, "Presence entries cleared");
    Ok(HttpResponse::Ok().json(json!({"removed": removed})))
}

#[utoipa::path(
    get,
    path = "/api/admin/role-requests",
    responses(
        (status = 200, description = "Employees with a pending admin request", body = [UserProfile]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn pending_role_requests(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let users: Vec<UserProfile> = state
        .users
        .pending_role_requests()
        .await?
        .iter()
        .map(UserProfile::from)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    post,
    path = "/api/admin/role-requests/{id}/approve",
    params(("id" = String, Path, description = "Requesting user id")),
    responses(
        (status = 200, description = "Request approved; user is now admin", body = UserProfile),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "No pending request")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn approve_role_request(
    auth: AuthUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let user = state
        .users
        .approve_role_request(&auth.user_id, &path.into_inner())
        .await?;
    // admins do not track attendance
    state.sessions.stop(&user.id).await;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

#[utoipa::path(
    post,
    path = "/api/admin/role-requests/{id}/reject",
    params(("id" = String, Path, description = "Requesting user id")),
    responses(
        (status = 200, description = "Request rejected", body = UserProfile),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "No pending request")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reject_role_request(
    auth: AuthUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let user = state
        .users
        .reject_role_request(&auth.user_id, &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

#[utoipa::path(
    post,
    path = "/api/admin/invitations",
    request_body = InviteAdmin,
    responses(
        (status = 201, description = "Invitation token for the given email", body = InvitationResponse),
        (status = 400, description = "Invalid email"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn invite_admin(
    auth: AuthUser,
    body: web::Json<InviteAdmin>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("Email is not valid".to_string()));
    }
    if !state.users.is_email_available(email).await? {
        return Err(IdentityError::EmailTaken.into());
    }

    let (token, claims) = generate_invite_token(&auth.user_id, email, &config.jwt_secret, config.invite_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign invitation token");
            ApiError::Internal
        })?;
    let invitation = state.users.record_invitation(&claims).await?;

    Ok(HttpResponse::Created().json(InvitationResponse { token, invitation }))
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    responses(
        (status = 200, description = "Role changes, oldest first", body = [RoleAuditEntry]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn audit_logs(auth: AuthUser, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let logs = state.users.audit_logs().await?;
    Ok(HttpResponse::Ok().json(logs))
}
