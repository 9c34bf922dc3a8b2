use chrono::{DateTime, Utc};
use derive_more::Display;

use crate::storage::StorageError;

#[derive(Debug, Display)]
pub enum AttendanceError {
    #[display(fmt = "{}", _0)]
    Storage(StorageError),
    /// Check-out earlier than check-in: clock skew or a corrupted record.
    #[display(fmt = "check-out at {} precedes check-in at {}", check_out, check_in)]
    Clock {
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
    },
    #[display(fmt = "location permission denied")]
    PermissionDenied,
    #[display(fmt = "only employees can record attendance")]
    NotAnEmployee,
    #[display(fmt = "invalid transition: {}", _0)]
    InvalidTransition(&'static str),
}

impl std::error::Error for AttendanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttendanceError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for AttendanceError {
    fn from(e: StorageError) -> Self {
        AttendanceError::Storage(e)
    }
}
