//! Roster core library: the duty roster model, fatigue alerts and the store surface.
//!
//! - [`time`]: 15-minute quantized time of day
//! - [`shift`] / [`post`]: slot occupancy and per-post shift validation
//! - [`assignment`] / [`alert`]: dated assignment facts and rest-time alerts
//! - [`store`]: [`store::RosterStore`] plus file and in-memory implementations
//! - [`config`]: [`config::RosterConfig`]
//! - [`error`]: [`RosterError`] and [`StoreError`]

pub mod alert;
pub mod assignment;
pub mod config;
pub mod error;
pub mod post;
pub mod shift;
pub mod store;
pub mod time;
pub mod types;

pub use alert::{alert_level, alert_level_in_window, AlertLevel};
pub use assignment::Assignment;
pub use config::RosterConfig;
pub use error::{RosterError, StoreError};
pub use post::Post;
pub use shift::{Placement, RoleCheck, Shift, ShiftKind, SlotDefinition};
pub use time::TimeOfDay;
pub use types::{Person, PersonId, PositionId, Role, ShiftId};
