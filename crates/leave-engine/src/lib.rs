//! # leave-engine
//!
//! Leave planning for a fiscal (or calendar) year: track how much leave a
//! person can spend on any date, then find the long weekends their calendar
//! already offers and stitch them into longer vacations at minimum leave cost.
//!
//! ## Modules
//!
//! - [`calendar`]: cycles, off-day classification and the merged calendar
//! - [`recurrence`]: weekly-off rules → concrete dates via `rrule`
//! - [`leave`]: weekly-off and custom leave definitions
//! - [`holiday`]: fixed paid holidays
//! - [`person`]: a person's cycle, leave types and personal days off
//! - [`ledger`]: credit / expiry / carry-forward balance ledger
//! - [`optimizer`]: vacation block detection and gap filling
//! - [`planner`]: per-person facade and reports
//! - [`config`]: JSON plan documents
//! - [`error`]: Error types

pub mod calendar;
pub mod config;
pub mod error;
pub mod holiday;
pub mod leave;
pub mod ledger;
pub mod optimizer;
pub mod person;
pub mod planner;
pub mod recurrence;

pub use calendar::{CalendarBuilder, Cycle, CycleSpec, MonthDay, OffDay, OffDayCalendar, OffReason};
pub use config::PlanConfig;
pub use error::{FieldError, PlanError, ValidationErrors};
pub use holiday::Holiday;
pub use leave::{CustomLeave, LeaveConstraints, LeaveType, UsageLimit, WeeklyOff};
pub use ledger::{CycleState, Ledger, Rollover};
pub use optimizer::{BlockQuery, Gap, VacationBlock};
pub use person::Person;
pub use planner::{BlockReport, LongWeekends, PaidHolidays, PlanReport, Planner};
