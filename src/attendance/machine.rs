//! Attendance decisions.
//!
//! [`AttendanceStateMachine::evaluate`] looks at one snapshot (record, zones, position,
//! what triggered the evaluation) and names the only legal next step.
//! [`AttendanceStateMachine::apply`] turns that step into a fresh record value. Neither
//! does I/O; persisting the result is the caller's job.
//!
//! Per user and day the record moves `NOT_CHECKED_IN -> CHECKED_IN -> CHECKED_OUT` and
//! stops there.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use strum_macros::{AsRefStr, Display};

use crate::attendance::error::AttendanceError;
use crate::geofence;
use crate::model::attendance::{AttendanceRecord, AutoCheckoutReason};
use crate::model::location::LocationSample;
use crate::model::zone::GeofenceZone;

/// What caused this evaluation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Trigger {
    CheckIn,
    /// Geofence-gated check-out requested by the employee.
    CheckOut,
    /// Check-out without a geofence check, for devices with degraded location.
    ManualCheckout,
    /// A sample from the watcher. `was_inside` is the membership of the previous
    /// sample, `None` when no sample has been seen since the session started.
    Sample { was_inside: Option<bool> },
    PermissionRevoked,
}

/// Expected "nothing to do" outcomes. The text is shown to the user as is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, AsRefStr)]
pub enum NoActionReason {
    #[strum(to_string = "no geofence assigned")]
    NoGeofenceAssigned,
    #[strum(to_string = "outside geofence")]
    OutsideGeofence,
    #[strum(to_string = "inside geofence")]
    InsideGeofence,
    #[strum(to_string = "daily attendance completed")]
    DailyAttendanceCompleted,
    #[strum(to_string = "location unavailable")]
    LocationUnavailable,
    #[strum(to_string = "already checked in")]
    AlreadyCheckedIn,
    #[strum(to_string = "not checked in")]
    NotCheckedIn,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum CheckOutKind {
    #[strum(to_string = "geofenced")]
    Geofenced,
    #[strum(to_string = "manual")]
    Manual,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Decision {
    NoAction(NoActionReason),
    CheckIn,
    CheckOut(CheckOutKind),
    AutoCheckOut(AutoCheckoutReason),
}

impl Decision {
    pub fn is_transition(&self) -> bool {
        !matches!(self, Decision::NoAction(_))
    }

    pub fn no_action_reason(&self) -> Option<NoActionReason> {
        match self {
            Decision::NoAction(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Everything a decision depends on, captured at one instant.
#[derive(Debug, Clone)]
pub struct Evaluation<'a> {
    pub user_id: &'a str,
    pub now: DateTime<Utc>,
    /// Local calendar day the record belongs to.
    pub date: NaiveDate,
    pub location: Option<LocationSample>,
    pub zones: &'a [GeofenceZone],
    pub existing: Option<&'a AttendanceRecord>,
    pub trigger: Trigger,
}

#[derive(Debug, Clone)]
pub struct AttendanceStateMachine {
    max_sample_age: Duration,
}

impl Default for AttendanceStateMachine {
    fn default() -> Self {
        Self::new(Duration::seconds(120))
    }
}

impl AttendanceStateMachine {
    pub fn new(max_sample_age: Duration) -> Self {
        Self { max_sample_age }
    }

    pub fn evaluate(&self, ev: &Evaluation<'_>) -> Decision {
        use NoActionReason::*;

        if ev.existing.is_some_and(|r| r.is_closed()) {
            return Decision::NoAction(DailyAttendanceCompleted);
        }
        let open = ev.existing.is_some();

        match ev.trigger {
            Trigger::CheckIn => {
                if ev.zones.is_empty() {
                    return Decision::NoAction(NoGeofenceAssigned);
                }
                if open {
                    return Decision::NoAction(AlreadyCheckedIn);
                }
                match self.membership(ev) {
                    None => Decision::NoAction(LocationUnavailable),
                    Some(false) => Decision::NoAction(OutsideGeofence),
                    Some(true) => Decision::CheckIn,
                }
            }
            Trigger::CheckOut => {
                if ev.zones.is_empty() {
                    return Decision::NoAction(NoGeofenceAssigned);
                }
                if !open {
                    return Decision::NoAction(NotCheckedIn);
                }
                match self.membership(ev) {
                    None => Decision::NoAction(LocationUnavailable),
                    Some(false) => Decision::NoAction(OutsideGeofence),
                    Some(true) => Decision::CheckOut(CheckOutKind::Geofenced),
                }
            }
            Trigger::ManualCheckout => {
                if !open {
                    return Decision::NoAction(NotCheckedIn);
                }
                Decision::CheckOut(CheckOutKind::Manual)
            }
            Trigger::Sample { was_inside } => {
                if ev.zones.is_empty() {
                    return Decision::NoAction(NoGeofenceAssigned);
                }
                if !open {
                    return Decision::NoAction(NotCheckedIn);
                }
                match self.membership(ev) {
                    None => Decision::NoAction(LocationUnavailable),
                    Some(true) => Decision::NoAction(InsideGeofence),
                    // already outside on the previous sample; this is not an exit
                    Some(false) if was_inside == Some(false) => Decision::NoAction(OutsideGeofence),
                    Some(false) => Decision::AutoCheckOut(AutoCheckoutReason::LeftGeofence),
                }
            }
            Trigger::PermissionRevoked => {
                if !open {
                    return Decision::NoAction(NotCheckedIn);
                }
                Decision::AutoCheckOut(AutoCheckoutReason::PermissionRevoked)
            }
        }
    }

    /// `None` when there is no usable sample.
    fn membership(&self, ev: &Evaluation<'_>) -> Option<bool> {
        let sample = ev.location.as_ref()?;
        if ev.now.signed_duration_since(sample.captured_at) > self.max_sample_age {
            return None;
        }
        Some(geofence::inside_any(sample.coordinates(), ev.zones))
    }

    /// The record that results from `decision`, or `None` for [`Decision::NoAction`].
    pub fn apply(
        &self,
        decision: &Decision,
        ev: &Evaluation<'_>,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        match *decision {
            Decision::NoAction(_) => Ok(None),
            Decision::CheckIn => {
                if ev.existing.is_some() {
                    return Err(AttendanceError::InvalidTransition("a record already exists for today"));
                }
                let sample = ev
                    .location
                    .ok_or(AttendanceError::InvalidTransition("check-in needs a location"))?;
                Ok(Some(AttendanceRecord {
                    user_id: ev.user_id.to_string(),
                    date: ev.date,
                    check_in_time: ev.now,
                    check_in_location: sample.coordinates(),
                    check_out_time: None,
                    check_out_location: None,
                    total_hours: None,
                    is_completed: false,
                    manual_checkout: false,
                    auto_checkout: false,
                    auto_checkout_reason: None,
                }))
            }
            Decision::CheckOut(kind) => {
                let mut closed = close(ev)?;
                closed.manual_checkout = kind == CheckOutKind::Manual;
                Ok(Some(closed))
            }
            Decision::AutoCheckOut(reason) => {
                let mut closed = close(ev)?;
                closed.auto_checkout = true;
                closed.auto_checkout_reason = Some(reason);
                Ok(Some(closed))
            }
        }
    }
}

fn close(ev: &Evaluation<'_>) -> Result<AttendanceRecord, AttendanceError> {
    let existing = ev
        .existing
        .ok_or(AttendanceError::InvalidTransition("no open record to close"))?;
    if existing.is_closed() {
        return Err(AttendanceError::InvalidTransition("record already closed"));
    }

    let hours = total_hours(existing.check_in_time, ev.now)?;

    Ok(AttendanceRecord {
        check_out_time: Some(ev.now),
        check_out_location: ev.location.map(|s| s.coordinates()),
        total_hours: Some(hours),
        is_completed: true,
        ..existing.clone()
    })
}

/// Hours between check-in and check-out, rounded to two decimals.
pub fn total_hours(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Result<f64, AttendanceError> {
    let ms = check_out.signed_duration_since(check_in).num_milliseconds();
    if ms < 0 {
        return Err(AttendanceError::Clock { check_in, check_out });
    }
    let hours = ms as f64 / 3_600_000.0;
    Ok((hours * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn office() -> Vec<GeofenceZone> {
        vec![GeofenceZone::new("Office", 37.0, -122.0, 100.0).unwrap()]
    }

    fn sample(lat: f64, lon: f64, when: DateTime<Utc>) -> Option<LocationSample> {
        Some(LocationSample::new(lat, lon, when))
    }

    fn eval<'a>(
        zones: &'a [GeofenceZone],
        existing: Option<&'a AttendanceRecord>,
        location: Option<LocationSample>,
        now: DateTime<Utc>,
        trigger: Trigger,
    ) -> Evaluation<'a> {
        Evaluation {
            user_id: "u1",
            now,
            date: day(),
            location,
            zones,
            existing,
            trigger,
        }
    }

    fn checked_in(zones: &[GeofenceZone]) -> AttendanceRecord {
        let machine = AttendanceStateMachine::default();
        let ev = eval(zones, None, sample(37.0, -122.0, at(9, 0)), at(9, 0), Trigger::CheckIn);
        machine.apply(&Decision::CheckIn, &ev).unwrap().unwrap()
    }

    #[test]
    fn check_in_at_zone_center() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let ev = eval(&zones, None, sample(37.0, -122.0, at(9, 0)), at(9, 0), Trigger::CheckIn);
        assert_eq!(machine.evaluate(&ev), Decision::CheckIn);
    }

    #[test]
    fn no_zones_means_no_action_wherever_the_user_is() {
        let machine = AttendanceStateMachine::default();
        for (lat, lon) in [(37.0, -122.0), (0.0, 0.0), (-33.9, 151.2)] {
            for trigger in [Trigger::CheckIn, Trigger::CheckOut, Trigger::Sample { was_inside: None }] {
                let ev = eval(&[], None, sample(lat, lon, at(9, 0)), at(9, 0), trigger);
                assert_eq!(
                    machine.evaluate(&ev),
                    Decision::NoAction(NoActionReason::NoGeofenceAssigned)
                );
            }
        }
    }

    #[test]
    fn outside_and_missing_location_block_check_in() {
        let machine = AttendanceStateMachine::default();
        let zones = office();

        let ev = eval(&zones, None, sample(37.01, -122.0, at(9, 0)), at(9, 0), Trigger::CheckIn);
        assert_eq!(machine.evaluate(&ev), Decision::NoAction(NoActionReason::OutsideGeofence));

        let ev = eval(&zones, None, None, at(9, 0), Trigger::CheckIn);
        assert_eq!(machine.evaluate(&ev), Decision::NoAction(NoActionReason::LocationUnavailable));
    }

    #[test]
    fn stale_sample_counts_as_unavailable() {
        let machine = AttendanceStateMachine::new(Duration::seconds(60));
        let zones = office();
        let ev = eval(&zones, None, sample(37.0, -122.0, at(8, 58)), at(9, 0), Trigger::CheckIn);
        assert_eq!(machine.evaluate(&ev), Decision::NoAction(NoActionReason::LocationUnavailable));
    }

    #[test]
    fn evaluate_is_idempotent() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let record = checked_in(&zones);
        let ev = eval(
            &zones,
            Some(&record),
            sample(37.01, -122.0, at(12, 0)),
            at(12, 0),
            Trigger::Sample { was_inside: Some(true) },
        );
        assert_eq!(machine.evaluate(&ev), machine.evaluate(&ev));
    }

    #[test]
    fn closed_record_is_terminal_for_every_trigger() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let open = checked_in(&zones);
        let ev = eval(&zones, Some(&open), sample(37.0, -122.0, at(17, 0)), at(17, 0), Trigger::CheckOut);
        let closed = machine.apply(&machine.evaluate(&ev), &ev).unwrap().unwrap();

        let triggers = [
            Trigger::CheckIn,
            Trigger::CheckOut,
            Trigger::ManualCheckout,
            Trigger::Sample { was_inside: Some(true) },
            Trigger::PermissionRevoked,
        ];
        for trigger in triggers {
            for loc in [sample(37.0, -122.0, at(18, 0)), sample(50.0, 8.0, at(18, 0)), None] {
                let ev = eval(&zones, Some(&closed), loc, at(18, 0), trigger);
                assert_eq!(
                    machine.evaluate(&ev),
                    Decision::NoAction(NoActionReason::DailyAttendanceCompleted)
                );
            }
        }
    }

    #[test]
    fn check_in_record_has_no_check_out() {
        let zones = office();
        let record = checked_in(&zones);
        assert_eq!(record.check_in_time, at(9, 0));
        assert_eq!(record.date, day());
        assert!(record.is_open());
        assert_eq!(record.total_hours, None);
        assert!(!record.is_completed);
    }

    #[test]
    fn second_check_in_while_open_is_rejected() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let record = checked_in(&zones);
        let ev = eval(&zones, Some(&record), sample(37.0, -122.0, at(10, 0)), at(10, 0), Trigger::CheckIn);
        assert_eq!(machine.evaluate(&ev), Decision::NoAction(NoActionReason::AlreadyCheckedIn));
    }

    #[test]
    fn geofenced_check_out_computes_hours() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let record = checked_in(&zones);
        let ev = eval(&zones, Some(&record), sample(37.0, -122.0, at(17, 30)), at(17, 30), Trigger::CheckOut);

        let decision = machine.evaluate(&ev);
        assert_eq!(decision, Decision::CheckOut(CheckOutKind::Geofenced));
        let closed = machine.apply(&decision, &ev).unwrap().unwrap();
        assert_eq!(closed.total_hours, Some(8.5));
        assert!(closed.is_completed);
        assert!(!closed.manual_checkout);
        assert!(!closed.auto_checkout);
        assert_eq!(closed.check_in_time, record.check_in_time);
    }

    #[test]
    fn manual_checkout_ignores_location() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let record = checked_in(&zones);
        let ev = eval(&zones, Some(&record), None, at(13, 0), Trigger::ManualCheckout);

        let decision = machine.evaluate(&ev);
        assert_eq!(decision, Decision::CheckOut(CheckOutKind::Manual));
        let closed = machine.apply(&decision, &ev).unwrap().unwrap();
        assert!(closed.manual_checkout);
        assert_eq!(closed.check_out_location, None);
        assert_eq!(closed.total_hours, Some(4.0));
    }

    #[test]
    fn manual_checkout_without_open_record() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let ev = eval(&zones, None, None, at(13, 0), Trigger::ManualCheckout);
        assert_eq!(machine.evaluate(&ev), Decision::NoAction(NoActionReason::NotCheckedIn));
    }

    #[test]
    fn leaving_the_zone_triggers_auto_checkout() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let record = checked_in(&zones);
        let ev = eval(
            &zones,
            Some(&record),
            sample(37.01, -122.0, at(11, 0)),
            at(11, 0),
            Trigger::Sample { was_inside: Some(true) },
        );

        let decision = machine.evaluate(&ev);
        assert_eq!(decision, Decision::AutoCheckOut(AutoCheckoutReason::LeftGeofence));
        let closed = machine.apply(&decision, &ev).unwrap().unwrap();
        assert!(closed.auto_checkout);
        assert_eq!(closed.auto_checkout_reason, Some(AutoCheckoutReason::LeftGeofence));
        assert_eq!(closed.check_out_location.map(|c| c.latitude), Some(37.01));
    }

    #[test]
    fn samples_that_stay_put_do_nothing() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let record = checked_in(&zones);

        let inside = eval(
            &zones,
            Some(&record),
            sample(37.0001, -122.0, at(11, 0)),
            at(11, 0),
            Trigger::Sample { was_inside: Some(true) },
        );
        assert_eq!(machine.evaluate(&inside), Decision::NoAction(NoActionReason::InsideGeofence));

        let still_outside = eval(
            &zones,
            Some(&record),
            sample(37.01, -122.0, at(11, 0)),
            at(11, 0),
            Trigger::Sample { was_inside: Some(false) },
        );
        assert_eq!(machine.evaluate(&still_outside), Decision::NoAction(NoActionReason::OutsideGeofence));

        let first_sample_outside = eval(
            &zones,
            Some(&record),
            sample(37.01, -122.0, at(11, 0)),
            at(11, 0),
            Trigger::Sample { was_inside: None },
        );
        assert_eq!(
            machine.evaluate(&first_sample_outside),
            Decision::AutoCheckOut(AutoCheckoutReason::LeftGeofence)
        );
    }

    #[test]
    fn samples_never_check_in() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let ev = eval(
            &zones,
            None,
            sample(37.0, -122.0, at(9, 0)),
            at(9, 0),
            Trigger::Sample { was_inside: Some(false) },
        );
        assert_eq!(machine.evaluate(&ev), Decision::NoAction(NoActionReason::NotCheckedIn));
    }

    #[test]
    fn permission_revoked_closes_open_record_without_location() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let record = checked_in(&zones);
        let ev = eval(&zones, Some(&record), None, at(10, 15), Trigger::PermissionRevoked);

        let decision = machine.evaluate(&ev);
        assert_eq!(decision, Decision::AutoCheckOut(AutoCheckoutReason::PermissionRevoked));
        let closed = machine.apply(&decision, &ev).unwrap().unwrap();
        assert_eq!(closed.auto_checkout_reason, Some(AutoCheckoutReason::PermissionRevoked));
        assert_eq!(closed.check_out_location, None);
        assert_eq!(closed.total_hours, Some(1.25));
    }

    #[test]
    fn check_out_before_check_in_is_a_clock_error() {
        let machine = AttendanceStateMachine::default();
        let zones = office();
        let record = checked_in(&zones);
        let ev = eval(&zones, Some(&record), None, at(8, 0), Trigger::ManualCheckout);

        let result = machine.apply(&Decision::CheckOut(CheckOutKind::Manual), &ev);
        assert!(matches!(result, Err(AttendanceError::Clock { .. })));
    }

    #[test]
    fn hours_round_to_two_decimals() {
        assert_eq!(total_hours(at(9, 0), at(17, 30)).unwrap(), 8.5);
        assert_eq!(total_hours(at(9, 0), at(9, 0)).unwrap(), 0.0);
        assert_eq!(total_hours(at(9, 0), at(9, 20)).unwrap(), 0.33);
        assert!(total_hours(at(9, 1), at(9, 0)).is_err());
    }

    #[test]
    fn no_action_reasons_read_as_messages() {
        assert_eq!(NoActionReason::NoGeofenceAssigned.to_string(), "no geofence assigned");
        assert_eq!(NoActionReason::DailyAttendanceCompleted.to_string(), "daily attendance completed");
        assert_eq!(AutoCheckoutReason::LeftGeofence.to_string(), "left_geofence");
        assert_eq!(AutoCheckoutReason::PermissionRevoked.to_string(), "permission_revoked");
    }
}
