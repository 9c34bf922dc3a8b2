//! Runs state machine decisions against live identity, location and storage.
//!
//! Every operation for a user goes through that user's lock: read the record, decide,
//! persist. Two triggers racing for the same OPEN record are serialized, and the loser
//! sees the record CLOSED.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::attendance::error::AttendanceError;
use crate::attendance::machine::{AttendanceStateMachine, Decision, Evaluation, NoActionReason, Trigger};
use crate::attendance::store::AttendanceRecordStore;
use crate::geofence;
use crate::location::provider::{LocationProvider, PermissionStatus, read_position};
use crate::model::attendance::{AttendanceRecord, AttendanceState, AutoCheckoutReason};
use crate::model::location::LocationSample;
use crate::model::notification::{Notification, NotificationKind};
use crate::presence::PresenceBroadcaster;
use crate::services::identity::{CurrentUser, IdentityProvider};
use crate::services::notifications::NotificationCenter;
use crate::storage::StorageResult;
use crate::utils::time::{Clock, local_day};

/// What an operation decided and the record as it stands afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub decision: Decision,
    pub record: Option<AttendanceRecord>,
}

/// Today's state plus what the employee could do next.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodayStatus {
    pub state: AttendanceState,
    pub record: Option<AttendanceRecord>,
    pub permission: PermissionStatus,
    pub can_check_in: bool,
    pub can_check_out: bool,
    /// Why the next geofenced step is not available, if it is not.
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct UserState {
    /// Zone membership of the previous handled sample.
    last_inside: Option<bool>,
    last_sample: Option<LocationSample>,
}

pub struct AttendanceService {
    records: AttendanceRecordStore,
    presence: PresenceBroadcaster,
    notifications: Arc<NotificationCenter>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    machine: AttendanceStateMachine,
    location_timeout: Duration,
    users: Mutex<HashMap<String, Arc<Mutex<UserState>>>>,
}

impl AttendanceService {
    pub fn new(
        records: AttendanceRecordStore,
        presence: PresenceBroadcaster,
        notifications: Arc<NotificationCenter>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        machine: AttendanceStateMachine,
        location_timeout: Duration,
    ) -> Self {
        Self {
            records,
            presence,
            notifications,
            identity,
            clock,
            machine,
            location_timeout,
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn records(&self) -> &AttendanceRecordStore {
        &self.records
    }

    pub fn presence(&self) -> &PresenceBroadcaster {
        &self.presence
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<UserState>> {
        let mut users = self.users.lock().await;
        users.entry(user_id.to_string()).or_default().clone()
    }

    /// Drops the per-user state kept between samples.
    pub async fn forget(&self, user_id: &str) {
        self.users.lock().await.remove(user_id);
    }

    async fn employee(&self, user_id: &str) -> Result<CurrentUser, AttendanceError> {
        match self.identity.current_user(user_id).await? {
            Some(user) if user.role.tracks_attendance() => Ok(user),
            _ => Err(AttendanceError::NotAnEmployee),
        }
    }

    /// Position for a user-initiated action. `None` when the read timed out.
    async fn fresh_position(&self, provider: &dyn LocationProvider) -> Result<Option<LocationSample>, AttendanceError> {
        if provider.permission_status().await == PermissionStatus::Denied {
            return Err(AttendanceError::PermissionDenied);
        }
        match read_position(provider, self.location_timeout).await {
            Ok(sample) => Ok(Some(sample)),
            Err(e) => {
                warn!(error = %e, "location unavailable");
                Ok(None)
            }
        }
    }

    pub async fn check_in(&self, user_id: &str, provider: &dyn LocationProvider) -> Result<Outcome, AttendanceError> {
        let user = self.employee(user_id).await?;
        let location = self.fresh_position(provider).await?;

        let lock = self.user_lock(user_id).await;
        let mut state = lock.lock().await;
        let outcome = self.decide(&user, Trigger::CheckIn, location).await?;
        if outcome.decision == Decision::CheckIn {
            state.last_inside = Some(true);
            state.last_sample = location;
        }
        Ok(outcome)
    }

    pub async fn check_out(&self, user_id: &str, provider: &dyn LocationProvider) -> Result<Outcome, AttendanceError> {
        let user = self.employee(user_id).await?;
        let location = self.fresh_position(provider).await?;

        let lock = self.user_lock(user_id).await;
        let _state = lock.lock().await;
        self.decide(&user, Trigger::CheckOut, location).await
    }

    /// Available even when location permission is denied.
    pub async fn manual_checkout(&self, user_id: &str, provider: &dyn LocationProvider) -> Result<Outcome, AttendanceError> {
        let user = self.employee(user_id).await?;

        let lock = self.user_lock(user_id).await;
        let state = lock.lock().await;
        let location = provider.last_known().or(state.last_sample);
        self.decide(&user, Trigger::ManualCheckout, location).await
    }

    /// One sample from the user's watcher: publish presence, then check for an exit.
    pub async fn handle_sample(&self, user_id: &str, sample: LocationSample) -> Result<Outcome, AttendanceError> {
        let user = self.employee(user_id).await?;
        let inside = geofence::inside_any(sample.coordinates(), &user.assigned_zones);

        if let Err(e) = self.presence.publish(user_id, &sample, inside).await {
            warn!(user_id, error = %e, "presence update failed");
        }

        let lock = self.user_lock(user_id).await;
        let mut state = lock.lock().await;
        let trigger = Trigger::Sample {
            was_inside: state.last_inside,
        };
        let outcome = self.decide(&user, trigger, Some(sample)).await?;
        // a failed persist leaves the previous membership in place; a stale fix never replaces it
        if outcome.decision != Decision::NoAction(NoActionReason::LocationUnavailable) {
            state.last_inside = Some(inside);
            state.last_sample = Some(sample);
        }
        Ok(outcome)
    }

    /// Permission reported by the user's watcher. Revocation closes an open record;
    /// any other status has nothing to evaluate.
    pub async fn handle_permission(
        &self,
        user_id: &str,
        status: PermissionStatus,
    ) -> Result<Option<Outcome>, AttendanceError> {
        if status != PermissionStatus::Denied {
            info!(user_id, %status, "location permission changed");
            return Ok(None);
        }

        let user = self.employee(user_id).await?;
        let lock = self.user_lock(user_id).await;
        let state = lock.lock().await;
        warn!(user_id, "location permission revoked");
        self.decide(&user, Trigger::PermissionRevoked, state.last_sample)
            .await
            .map(Some)
    }

    /// Evaluate, apply and persist under the caller-held user lock.
    async fn decide(
        &self,
        user: &CurrentUser,
        trigger: Trigger,
        location: Option<LocationSample>,
    ) -> Result<Outcome, AttendanceError> {
        let now = self.clock.now();
        let date = local_day(now);
        let existing = self.records.get(&user.id, date).await?;

        let ev = Evaluation {
            user_id: &user.id,
            now,
            date,
            location,
            zones: &user.assigned_zones,
            existing: existing.as_ref(),
            trigger,
        };
        let decision = self.machine.evaluate(&ev);

        let updated = match self.machine.apply(&decision, &ev) {
            Ok(updated) => updated,
            Err(e) => {
                // the record stays OPEN
                error!(user_id = %user.id, error = %e, "attendance transition rejected");
                return Err(e);
            }
        };

        let Some(record) = updated else {
            return Ok(Outcome {
                decision,
                record: existing,
            });
        };

        if let Err(e) = self.records.put(&record).await {
            error!(user_id = %user.id, error = %e, "failed to persist attendance record");
            return Err(e.into());
        }

        match decision {
            Decision::CheckIn => info!(user_id = %user.id, %date, "checked in"),
            Decision::CheckOut(kind) => {
                info!(user_id = %user.id, %date, %kind, hours = ?record.total_hours, "checked out")
            }
            Decision::AutoCheckOut(reason) => {
                info!(user_id = %user.id, %date, %reason, hours = ?record.total_hours, "auto checked out");
                self.notify_auto_checkout(&user.id, reason).await;
            }
            Decision::NoAction(_) => {}
        }

        Ok(Outcome {
            decision,
            record: Some(record),
        })
    }

    async fn notify_auto_checkout(&self, user_id: &str, reason: AutoCheckoutReason) {
        let message = match reason {
            AutoCheckoutReason::LeftGeofence => "You were checked out automatically after leaving your work zone.",
            AutoCheckoutReason::PermissionRevoked => {
                "You were checked out automatically because location permission was revoked."
            }
        };
        let notification = Notification::new(
            user_id,
            NotificationKind::Attendance,
            "Automatic Check-out",
            message,
            self.clock.now(),
        );
        if let Err(e) = self.notifications.push(notification).await {
            error!(user_id, error = %e, "failed to store auto-checkout notification");
        }
    }

    /// Today's record and whether check-in / check-out would currently succeed.
    pub async fn today(&self, user_id: &str, provider: &dyn LocationProvider) -> Result<TodayStatus, AttendanceError> {
        let user = self.employee(user_id).await?;
        let now = self.clock.now();
        let date = local_day(now);
        let record = self.records.get(user_id, date).await?;
        let permission = provider.permission_status().await;

        let evaluate = |trigger| {
            self.machine.evaluate(&Evaluation {
                user_id: &user.id,
                now,
                date,
                location: provider.last_known(),
                zones: &user.assigned_zones,
                existing: record.as_ref(),
                trigger,
            })
        };
        let check_in = evaluate(Trigger::CheckIn);
        let check_out = evaluate(Trigger::CheckOut);

        let state = AttendanceState::of(record.as_ref());
        let pending = match state {
            AttendanceState::NotCheckedIn => check_in,
            _ => check_out,
        };
        let reason = if permission == PermissionStatus::Denied && state != AttendanceState::CheckedOut {
            Some(AttendanceError::PermissionDenied.to_string())
        } else {
            pending.no_action_reason().map(|r| r.to_string())
        };

        Ok(TodayStatus {
            state,
            record,
            permission,
            can_check_in: permission != PermissionStatus::Denied && check_in.is_transition(),
            can_check_out: permission != PermissionStatus::Denied && check_out.is_transition(),
            reason,
        })
    }

    pub async fn history(&self, user_id: &str) -> StorageResult<Vec<AttendanceRecord>> {
        self.records.list_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::machine::CheckOutKind;
    use crate::location::provider::DeviceLocation;
    use crate::model::role::Role;
    use crate::model::zone::GeofenceZone;
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::utils::time::ManualClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct Directory(Vec<CurrentUser>);

    #[async_trait]
    impl IdentityProvider for Directory {
        async fn current_user(&self, user_id: &str) -> StorageResult<Option<CurrentUser>> {
            Ok(self.0.iter().find(|u| u.id == user_id).cloned())
        }
    }

    struct Fixture {
        service: Arc<AttendanceService>,
        kv: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        device: DeviceLocation,
        notifications: Arc<NotificationCenter>,
    }

    fn user(id: &str, role: Role, zones: Vec<GeofenceZone>) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            email: format!("{}@company.com", id),
            role,
            assigned_zones: zones,
        }
    }

    fn office() -> GeofenceZone {
        GeofenceZone::new("Office", 37.0, -122.0, 100.0).unwrap()
    }

    fn fixture() -> Fixture {
        let kv = Arc::new(MemoryStore::new());
        let store: Arc<dyn KeyValueStore> = kv.clone();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()));
        let notifications = Arc::new(NotificationCenter::new(store.clone()));
        let identity = Arc::new(Directory(vec![
            user("emp", Role::Employee, vec![office()]),
            user("nozone", Role::Employee, vec![]),
            user("boss", Role::Admin, vec![office()]),
        ]));
        let service = Arc::new(AttendanceService::new(
            AttendanceRecordStore::new(store.clone()),
            PresenceBroadcaster::new(store),
            notifications.clone(),
            identity,
            clock.clone(),
            AttendanceStateMachine::default(),
            Duration::from_secs(1),
        ));
        Fixture {
            service,
            kv,
            clock,
            device: DeviceLocation::new(),
            notifications,
        }
    }

    impl Fixture {
        fn at(&self, latitude: f64, longitude: f64) -> LocationSample {
            let sample = LocationSample::new(latitude, longitude, self.clock.now());
            self.device.report_fix(sample);
            sample
        }
    }

    #[tokio::test]
    async fn check_in_at_zone_center_opens_record() {
        let f = fixture();
        f.at(37.0, -122.0);

        let outcome = f.service.check_in("emp", &f.device).await.unwrap();
        assert_eq!(outcome.decision, Decision::CheckIn);
        let record = outcome.record.unwrap();
        assert!(record.is_open());

        let stored = f.service.records().get("emp", record.date).await.unwrap();
        assert_eq!(stored, Some(record));

        let again = f.service.check_in("emp", &f.device).await.unwrap();
        assert_eq!(again.decision, Decision::NoAction(NoActionReason::AlreadyCheckedIn));
    }

    #[tokio::test]
    async fn leaving_the_zone_checks_out_automatically() {
        let f = fixture();
        f.at(37.0, -122.0);
        f.service.check_in("emp", &f.device).await.unwrap();

        f.clock.advance(chrono::Duration::minutes(90));
        let outcome = f.service.handle_sample("emp", f.at(37.01, -122.0)).await.unwrap();
        assert_eq!(outcome.decision, Decision::AutoCheckOut(AutoCheckoutReason::LeftGeofence));
        let record = outcome.record.unwrap();
        assert!(record.auto_checkout);
        assert_eq!(record.total_hours, Some(1.5));
        assert_eq!(record.auto_checkout_reason, Some(AutoCheckoutReason::LeftGeofence));

        let presence = f.service.presence().get("emp").await.unwrap().unwrap();
        assert!(!presence.is_inside);
        assert_eq!(f.notifications.list("emp").await.unwrap().len(), 1);

        let later = f.service.handle_sample("emp", f.at(37.02, -122.0)).await.unwrap();
        assert_eq!(later.decision, Decision::NoAction(NoActionReason::DailyAttendanceCompleted));
    }

    #[tokio::test]
    async fn stale_outside_fix_does_not_hide_the_exit() {
        let f = fixture();
        f.at(37.0, -122.0);
        f.service.check_in("emp", &f.device).await.unwrap();

        f.clock.advance(chrono::Duration::minutes(30));
        let delayed = LocationSample::new(37.01, -122.0, f.clock.now() - chrono::Duration::minutes(5));
        let stale = f.service.handle_sample("emp", delayed).await.unwrap();
        assert_eq!(stale.decision, Decision::NoAction(NoActionReason::LocationUnavailable));
        assert!(stale.record.unwrap().is_open());

        let outcome = f.service.handle_sample("emp", f.at(37.0101, -122.0)).await.unwrap();
        assert_eq!(outcome.decision, Decision::AutoCheckOut(AutoCheckoutReason::LeftGeofence));
        assert!(outcome.record.unwrap().auto_checkout);
    }

    #[tokio::test]
    async fn samples_inside_the_zone_keep_the_record_open() {
        let f = fixture();
        f.at(37.0, -122.0);
        f.service.check_in("emp", &f.device).await.unwrap();

        let outcome = f.service.handle_sample("emp", f.at(37.0003, -122.0)).await.unwrap();
        assert_eq!(outcome.decision, Decision::NoAction(NoActionReason::InsideGeofence));
        assert!(outcome.record.unwrap().is_open());
    }

    #[tokio::test]
    async fn racing_checkouts_close_the_record_once() {
        let f = fixture();
        f.at(37.0, -122.0);
        f.service.check_in("emp", &f.device).await.unwrap();
        f.clock.advance(chrono::Duration::hours(1));
        let outside = f.at(37.01, -122.0);

        let auto = {
            let service = f.service.clone();
            tokio::spawn(async move { service.handle_sample("emp", outside).await })
        };
        let manual = f.service.manual_checkout("emp", &f.device).await.unwrap();
        let auto = auto.await.unwrap().unwrap();

        let transitions = [manual.decision, auto.decision]
            .iter()
            .filter(|d| d.is_transition())
            .count();
        assert_eq!(transitions, 1);
        let loser = if manual.decision.is_transition() { auto } else { manual };
        assert_eq!(loser.decision, Decision::NoAction(NoActionReason::DailyAttendanceCompleted));
    }

    #[tokio::test]
    async fn failed_persist_leaves_state_unchanged() {
        let f = fixture();
        f.at(37.0, -122.0);
        f.kv.set_fail_writes(true);

        let err = f.service.check_in("emp", &f.device).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Storage(_)));

        f.kv.set_fail_writes(false);
        let today = f.service.today("emp", &f.device).await.unwrap();
        assert_eq!(today.state, AttendanceState::NotCheckedIn);
        assert!(today.can_check_in);
    }

    #[tokio::test]
    async fn revoked_permission_closes_open_record() {
        let f = fixture();
        f.at(37.0, -122.0);
        f.service.check_in("emp", &f.device).await.unwrap();

        f.device.report_permission(PermissionStatus::Denied);
        let outcome = f
            .service
            .handle_permission("emp", PermissionStatus::Denied)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.decision, Decision::AutoCheckOut(AutoCheckoutReason::PermissionRevoked));

        assert!(f.service.handle_permission("emp", PermissionStatus::Granted).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn denied_permission_leaves_manual_checkout() {
        let f = fixture();
        f.at(37.0, -122.0);
        f.service.check_in("emp", &f.device).await.unwrap();
        f.device.report_permission(PermissionStatus::Denied);

        assert!(matches!(
            f.service.check_out("emp", &f.device).await,
            Err(AttendanceError::PermissionDenied)
        ));
        let today = f.service.today("emp", &f.device).await.unwrap();
        assert!(!today.can_check_out);
        assert_eq!(today.reason.as_deref(), Some("location permission denied"));

        let outcome = f.service.manual_checkout("emp", &f.device).await.unwrap();
        assert_eq!(outcome.decision, Decision::CheckOut(CheckOutKind::Manual));
        assert!(outcome.record.unwrap().manual_checkout);
    }

    #[tokio::test]
    async fn no_zone_and_admin_cannot_check_in() {
        let f = fixture();
        f.at(37.0, -122.0);

        let outcome = f.service.check_in("nozone", &f.device).await.unwrap();
        assert_eq!(outcome.decision, Decision::NoAction(NoActionReason::NoGeofenceAssigned));
        assert!(matches!(
            f.service.check_in("boss", &f.device).await,
            Err(AttendanceError::NotAnEmployee)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_fix_is_location_unavailable() {
        let f = fixture();
        let outcome = f.service.check_in("emp", &f.device).await.unwrap();
        assert_eq!(outcome.decision, Decision::NoAction(NoActionReason::LocationUnavailable));
    }

    #[tokio::test]
    async fn backwards_clock_rejects_checkout_and_keeps_record_open() {
        let f = fixture();
        f.at(37.0, -122.0);
        f.service.check_in("emp", &f.device).await.unwrap();

        f.clock.advance(-chrono::Duration::minutes(30));
        f.at(37.0, -122.0);
        assert!(matches!(
            f.service.check_out("emp", &f.device).await,
            Err(AttendanceError::Clock { .. })
        ));
        let today = f.service.today("emp", &f.device).await.unwrap();
        assert_eq!(today.state, AttendanceState::CheckedIn);
    }
}
