use crate::api::admin::{ChangeRole, CreateZone, InvitationResponse, InviteAdmin};
use crate::api::attendance::{AttendanceAction, AttendanceResponse};
use crate::api::device::{ReportLocation, ReportPermission};
use crate::api::me::MeResponse;
use crate::api::roles::RoleRequestView;
use crate::attendance::TodayStatus;
use crate::auth::handlers::LoginResponse;
use crate::location::provider::PermissionStatus;
use crate::model::attendance::{AttendanceRecord, AttendanceState, AutoCheckoutReason};
use crate::model::location::{Coordinates, LocationSample};
use crate::model::notification::{Notification, NotificationKind};
use crate::model::presence::PresenceEntry;
use crate::model::role::Role;
use crate::model::user::{NotificationSettings, RoleRequestState, RoleRequestStatus, UserProfile};
use crate::model::zone::GeofenceZone;
use crate::models::{LoginReqDto, RegisterReq};
use crate::services::users::{AdminInvitation, AuditAction, RoleAuditEntry};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Onsite Attendance API",
        version = "1.0.0",
        description = r#"
## Geofenced workforce attendance

Employees check in and out of circular work zones; a background session watches
their device position and checks them out automatically when they leave.

### 🔹 Key Features
- **Attendance**
  - Geofenced check-in and check-out, manual check-out, daily status and history
- **Device bridge**
  - Position fixes and permission changes forwarded by the device
- **Administration**
  - Zone assignment, attendance and presence views, role requests, admin invitations

### 🔐 Security
Endpoints under `/api` are protected using **JWT Bearer authentication**.
Only **Admin** users can access `/api/admin`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::manual_checkout,
        crate::api::attendance::today,
        crate::api::attendance::history,

        crate::api::device::report_location,
        crate::api::device::report_permission,

        crate::api::me::me,
        crate::api::me::update_notification_settings,
        crate::api::zones::my_zones,
        crate::api::notifications::list_notifications,
        crate::api::notifications::mark_read,
        crate::api::roles::request_admin_role,
        crate::api::roles::role_request_status,

        crate::api::admin::list_employees,
        crate::api::admin::change_role,
        crate::api::admin::list_zones,
        crate::api::admin::assign_zone,
        crate::api::admin::remove_zone,
        crate::api::admin::list_attendance,
        crate::api::admin::clear_attendance,
        crate::api::admin::list_presence,
        crate::api::admin::clear_presence,
        crate::api::admin::pending_role_requests,
        crate::api::admin::approve_role_request,
        crate::api::admin::reject_role_request,
        crate::api::admin::invite_admin,
        crate::api::admin::audit_logs
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            Role,
            UserProfile,
            RoleRequestState,
            RoleRequestStatus,
            NotificationSettings,
            MeResponse,
            Coordinates,
            LocationSample,
            GeofenceZone,
            AttendanceRecord,
            AttendanceState,
            AutoCheckoutReason,
            AttendanceAction,
            AttendanceResponse,
            TodayStatus,
            PermissionStatus,
            ReportLocation,
            ReportPermission,
            PresenceEntry,
            Notification,
            NotificationKind,
            RoleRequestView,
            CreateZone,
            ChangeRole,
            InviteAdmin,
            InvitationResponse,
            AdminInvitation,
            AuditAction,
            RoleAuditEntry
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance APIs"),
        (name = "Device", description = "Device location bridge"),
        (name = "Account", description = "Own profile"),
        (name = "Zones", description = "Assigned geofences"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Roles", description = "Admin role requests"),
        (name = "Admin", description = "Administration APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
