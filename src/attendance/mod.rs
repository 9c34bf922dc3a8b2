pub mod error;
pub mod machine;
pub mod service;
pub mod session;
pub mod store;

pub use error::AttendanceError;
pub use machine::{AttendanceStateMachine, CheckOutKind, Decision, Evaluation, NoActionReason, Trigger};
pub use service::{AttendanceService, Outcome, TodayStatus};
pub use session::SessionRegistry;
pub use store::AttendanceRecordStore;
