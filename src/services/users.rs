//! User accounts, admin invitations and role-elevation requests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::model::notification::{Notification, NotificationKind};
use crate::model::role::Role;
use crate::model::user::{NotificationSettings, RoleRequestState, RoleRequestStatus, User};
use crate::models::{Claims, TokenType};
use crate::services::identity::{CurrentUser, IdentityProvider};
use crate::services::notifications::NotificationCenter;
use crate::services::zones::ZoneRegistry;
use crate::storage::{self, KeyValueStore, StorageError, StorageResult};
use crate::utils::email_cache::EmailCache;
use crate::utils::email_filter::{EmailFilter, normalize};
use crate::utils::time::Clock;

pub const USER_PREFIX: &str = "user:";
const EMAIL_PREFIX: &str = "user_email:";
const INVITATIONS_KEY: &str = "invitations";
const AUDIT_LOGS_KEY: &str = "role_audit_logs";

#[derive(Debug, Display)]
pub enum IdentityError {
    #[display(fmt = "{}", _0)]
    Storage(StorageError),
    #[display(fmt = "{}", _0)]
    Validation(String),
    #[display(fmt = "Email already registered")]
    EmailTaken,
    #[display(fmt = "Invalid credentials")]
    InvalidCredentials,
    #[display(fmt = "User not found")]
    NotFound,
    #[display(fmt = "Invalid admin invitation token")]
    InvalidInvitation,
    #[display(fmt = "You are already an admin")]
    AlreadyAdmin,
    #[display(fmt = "You cannot request the admin role again until {}", until)]
    CooldownActive { until: DateTime<Utc> },
    #[display(fmt = "No pending role request for this user")]
    NoPendingRequest,
    #[display(fmt = "Password hashing failed: {}", _0)]
    Hashing(String),
}

impl std::error::Error for IdentityError {}

impl From<StorageError> for IdentityError {
    fn from(e: StorageError) -> Self {
        IdentityError::Storage(e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminInvitation {
    pub email: String,
    /// Id of the signed token; the token itself is handed to the invitee only.
    pub token_id: String,
    #[schema(value_type = String, format = "date-time")]
    pub expires_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, StrumDisplay, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    RoleChange,
    RoleRequestRejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleAuditEntry {
    pub id: String,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub target_id: String,
    pub action: AuditAction,
    pub old_role: Role,
    pub new_role: Role,
}

pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub department: String,
}

pub struct UserDirectory {
    kv: Arc<dyn KeyValueStore>,
    zones: Arc<ZoneRegistry>,
    notifications: Arc<NotificationCenter>,
    filter: EmailFilter,
    cache: EmailCache,
    clock: Arc<dyn Clock>,
    role_request_cooldown: Duration,
    write_lock: Mutex<()>,
}

fn user_key(id: &str) -> String {
    format!("{}{}", USER_PREFIX, id)
}

fn email_key(email: &str) -> String {
    format!("{}{}", EMAIL_PREFIX, normalize(email))
}

impl UserDirectory {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        zones: Arc<ZoneRegistry>,
        notifications: Arc<NotificationCenter>,
        clock: Arc<dyn Clock>,
        role_request_cooldown: Duration,
    ) -> Self {
        Self {
            kv,
            zones,
            notifications,
            filter: EmailFilter::new(),
            cache: EmailCache::new(),
            clock,
            role_request_cooldown,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads every registered email into the filter and the cache, `batch_size` at a time.
    pub async fn warmup(&self, batch_size: usize) -> StorageResult<usize> {
        let keys = self.kv.list_keys(EMAIL_PREFIX).await?;
        let emails: Vec<String> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(EMAIL_PREFIX).map(str::to_string))
            .collect();

        for batch in emails.chunks(batch_size.max(1)) {
            self.filter.insert_batch(batch);
            self.cache.batch_mark(batch).await;
        }

        log::info!("Email index warmup complete: {} users", emails.len());
        Ok(emails.len())
    }

    /// true  => email AVAILABLE
    /// false => email TAKEN
    pub async fn is_email_available(&self, email: &str) -> StorageResult<bool> {
        // cuckoo filter: a miss is definitive
        if !self.filter.might_exist(email) {
            return Ok(true);
        }
        // cache: a hit is definitive
        if self.cache.is_taken(email).await {
            return Ok(false);
        }
        Ok(self.kv.get(&email_key(email)).await?.is_none())
    }

    pub async fn register(&self, new: NewUser, invite: Option<&Claims>) -> Result<User, IdentityError> {
        let email = normalize(&new.email);
        if email.is_empty() || new.password.is_empty() {
            return Err(IdentityError::Validation(
                "Email and password must not be empty".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(IdentityError::Validation("Email is not valid".to_string()));
        }

        let _guard = self.write_lock.lock().await;

        if !self.is_email_available(&email).await? {
            return Err(IdentityError::EmailTaken);
        }

        let first_user = self.kv.list_keys(USER_PREFIX).await?.is_empty();
        let role = match invite {
            Some(claims) => {
                self.find_invitation(&email, claims).await?;
                Role::Admin
            }
            None if first_user => Role::Admin,
            None => Role::Employee,
        };

        let password = hash_password(&new.password).map_err(|e| IdentityError::Hashing(e.to_string()))?;
        let name = if new.name.trim().is_empty() {
            email.clone()
        } else {
            new.name.trim().to_string()
        };

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name,
            department: new.department.trim().to_string(),
            password,
            role,
            role_request: RoleRequestStatus::default(),
            notification_settings: NotificationSettings::default(),
            created_at: self.clock.now(),
        };

        self.insert_user(&user).await?;
        if let Some(claims) = invite {
            if let Err(e) = self.consume_invitation(&email, claims).await {
                self.discard_user(&user).await;
                return Err(e);
            }
        }

        self.filter.insert(&email);
        self.cache.mark_taken(&email).await;

        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, IdentityError> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        if let Err(e) = verify_password(password, &user.password) {
            info!(error = %e, "Invalid credentials: password mismatch");
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> StorageResult<Option<User>> {
        storage::get_json(self.kv.as_ref(), &user_key(user_id)).await
    }

    pub async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        match self.kv.get(&email_key(email)).await? {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    pub async fn list(&self, role: Option<Role>) -> StorageResult<Vec<User>> {
        let mut users: Vec<User> = storage::list_json(self.kv.as_ref(), USER_PREFIX)
            .await?
            .into_iter()
            .map(|(_, u)| u)
            .filter(|u: &User| role.is_none_or(|r| u.role == r))
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    /// Writes the user and its email index. A user whose index write failed is removed again.
    async fn insert_user(&self, user: &User) -> StorageResult<()> {
        storage::set_json(self.kv.as_ref(), &user_key(&user.id), user).await?;
        if let Err(e) = self.kv.set(&email_key(&user.email), &user.id).await {
            if let Err(cleanup) = self.kv.remove(&user_key(&user.id)).await {
                error!(user_id = %user.id, error = %cleanup, "failed to remove unindexed user");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn discard_user(&self, user: &User) {
        let keys = [email_key(&user.email), user_key(&user.id)];
        if let Err(e) = self.kv.multi_remove(&keys).await {
            error!(user_id = %user.id, error = %e, "failed to roll back registration");
        }
    }

    async fn save(&self, user: &User) -> StorageResult<()> {
        storage::set_json(self.kv.as_ref(), &user_key(&user.id), user).await
    }

    async fn require(&self, user_id: &str) -> Result<User, IdentityError> {
        self.get(user_id).await?.ok_or(IdentityError::NotFound)
    }

    /// Records an invitation issued as `claims`; a newer invitation replaces any older
    /// one for the same email.
    pub async fn record_invitation(&self, claims: &Claims) -> StorageResult<AdminInvitation> {
        let _guard = self.write_lock.lock().await;
        let mut invitations: Vec<AdminInvitation> = storage::get_json(self.kv.as_ref(), INVITATIONS_KEY)
            .await?
            .unwrap_or_default();

        let invitation = AdminInvitation {
            email: normalize(&claims.sub),
            token_id: claims.jti.clone(),
            expires_at: DateTime::from_timestamp(claims.exp as i64, 0).unwrap_or_else(|| self.clock.now()),
            created_by: claims.user_id.clone(),
        };
        invitations.retain(|inv| inv.email != invitation.email);
        invitations.push(invitation.clone());

        storage::set_json(self.kv.as_ref(), INVITATIONS_KEY, &invitations).await?;
        info!(email = %invitation.email, invited_by = %invitation.created_by, "Admin invitation created");
        Ok(invitation)
    }

    /// Pending invitations and the index of the one matching `claims`.
    async fn find_invitation(
        &self,
        email: &str,
        claims: &Claims,
    ) -> Result<(Vec<AdminInvitation>, usize), IdentityError> {
        if claims.token_type != TokenType::Invite || normalize(&claims.sub) != email {
            warn!("Invitation presented for a different email");
            return Err(IdentityError::InvalidInvitation);
        }

        let invitations: Vec<AdminInvitation> = storage::get_json(self.kv.as_ref(), INVITATIONS_KEY)
            .await?
            .unwrap_or_default();
        let now = self.clock.now();
        let position = invitations
            .iter()
            .position(|inv| inv.email == email && inv.token_id == claims.jti && inv.expires_at > now)
            .ok_or(IdentityError::InvalidInvitation)?;
        Ok((invitations, position))
    }

    /// Single use: the invitation is removed once it has been accepted.
    async fn consume_invitation(&self, email: &str, claims: &Claims) -> Result<(), IdentityError> {
        let (mut invitations, position) = self.find_invitation(email, claims).await?;
        invitations.remove(position);
        storage::set_json(self.kv.as_ref(), INVITATIONS_KEY, &invitations).await?;
        Ok(())
    }

    /// `Err(until)` while the cooldown after a rejection is still running.
    pub fn check_cooldown(&self, user: &User) -> Result<(), DateTime<Utc>> {
        match user.role_request.last_rejected {
            Some(rejected) => {
                let until = rejected + self.role_request_cooldown;
                if self.clock.now() >= until { Ok(()) } else { Err(until) }
            }
            None => Ok(()),
        }
    }

    pub async fn request_admin_role(&self, user_id: &str) -> Result<User, IdentityError> {
        let _guard = self.write_lock.lock().await;
        let mut user = self.require(user_id).await?;

        if user.role == Role::Admin {
            return Err(IdentityError::AlreadyAdmin);
        }
        self.check_cooldown(&user)
            .map_err(|until| IdentityError::CooldownActive { until })?;

        let now = self.clock.now();
        user.role_request.last_requested = Some(now);
        user.role_request.status = Some(RoleRequestState::Pending);
        self.save(&user).await?;

        for admin in self.list(Some(Role::Admin)).await? {
            let notification = Notification::new(
                admin.id,
                NotificationKind::Approval,
                "New Admin Role Request",
                format!("{} has requested to become an admin.", user.name),
                now,
            );
            self.notifications.push(notification).await?;
        }

        info!(user_id, "Admin role requested");
        Ok(user)
    }

    pub async fn pending_role_requests(&self) -> StorageResult<Vec<User>> {
        Ok(self
            .list(Some(Role::Employee))
            .await?
            .into_iter()
            .filter(|u| u.role_request.status == Some(RoleRequestState::Pending))
            .collect())
    }

    pub async fn approve_role_request(&self, actor_id: &str, user_id: &str) -> Result<User, IdentityError> {
        let _guard = self.write_lock.lock().await;
        let mut user = self.require(user_id).await?;
        if user.role_request.status != Some(RoleRequestState::Pending) {
            return Err(IdentityError::NoPendingRequest);
        }

        let old_role = user.role;
        user.role = Role::Admin;
        user.role_request.status = Some(RoleRequestState::Approved);
        self.save(&user).await?;
        self.log_role_change(actor_id, user_id, AuditAction::RoleChange, old_role, Role::Admin)
            .await?;

        let notification = Notification::new(
            user_id,
            NotificationKind::RoleRequest,
            "Role Request Approved",
            "Your request to become an admin has been approved.",
            self.clock.now(),
        );
        self.notifications.push(notification).await?;
        Ok(user)
    }

    pub async fn reject_role_request(&self, actor_id: &str, user_id: &str) -> Result<User, IdentityError> {
        let _guard = self.write_lock.lock().await;
        let mut user = self.require(user_id).await?;
        if user.role_request.status != Some(RoleRequestState::Pending) {
            return Err(IdentityError::NoPendingRequest);
        }

        let now = self.clock.now();
        user.role_request.last_rejected = Some(now);
        user.role_request.status = Some(RoleRequestState::Rejected);
        self.save(&user).await?;
        self.log_role_change(actor_id, user_id, AuditAction::RoleRequestRejected, user.role, user.role)
            .await?;

        let hours = self.role_request_cooldown.num_hours();
        let notification = Notification::new(
            user_id,
            NotificationKind::RoleRequest,
            "Role Request Rejected",
            format!(
                "Your request to become an admin has been rejected. You can request again after {} hours.",
                hours
            ),
            now,
        );
        self.notifications.push(notification).await?;
        Ok(user)
    }

    pub async fn change_user_role(&self, actor_id: &str, user_id: &str, role: Role) -> Result<User, IdentityError> {
        let _guard = self.write_lock.lock().await;
        let mut user = self.require(user_id).await?;
        let old_role = user.role;
        user.role = role;
        if user.role_request.status == Some(RoleRequestState::Pending) {
            user.role_request.status = None;
        }
        self.save(&user).await?;
        self.log_role_change(actor_id, user_id, AuditAction::RoleChange, old_role, role)
            .await?;
        Ok(user)
    }

    async fn log_role_change(
        &self,
        actor_id: &str,
        target_id: &str,
        action: AuditAction,
        old_role: Role,
        new_role: Role,
    ) -> StorageResult<()> {
        let mut logs: Vec<RoleAuditEntry> = storage::get_json(self.kv.as_ref(), AUDIT_LOGS_KEY)
            .await?
            .unwrap_or_default();
        logs.push(RoleAuditEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: self.clock.now(),
            actor_id: actor_id.to_string(),
            target_id: target_id.to_string(),
            action,
            old_role,
            new_role,
        });
        info!(actor_id, target_id, %action, %old_role, %new_role, "Role audit entry written");
        storage::set_json(self.kv.as_ref(), AUDIT_LOGS_KEY, &logs).await
    }

    pub async fn audit_logs(&self) -> StorageResult<Vec<RoleAuditEntry>> {
        Ok(storage::get_json(self.kv.as_ref(), AUDIT_LOGS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn update_notification_settings(
        &self,
        user_id: &str,
        settings: NotificationSettings,
    ) -> Result<User, IdentityError> {
        let _guard = self.write_lock.lock().await;
        let mut user = self.require(user_id).await?;
        user.notification_settings = settings;
        self.save(&user).await?;
        Ok(user)
    }
}

#[async_trait]
impl IdentityProvider for UserDirectory {
    async fn current_user(&self, user_id: &str) -> StorageResult<Option<CurrentUser>> {
        let Some(user) = self.get(user_id).await? else {
            return Ok(None);
        };
        let assigned_zones = self.zones.for_user(&user.id).await?;
        Ok(Some(CurrentUser {
            id: user.id,
            email: user.email,
            role: user.role,
            assigned_zones,
        }))
    }
}
