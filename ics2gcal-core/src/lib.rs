//! One-way reconciliation of a local iCalendar document against a remote
//! calendar.
//!
//! The engine derives a stable remote id for every source event, normalizes
//! start/end times into a configured output zone, diffs the canonical local
//! set against a windowed remote scan, and applies the resulting
//! create/update/delete plan. Modified instances of recurring series are
//! patched in place through a dedicated expansion query.
//!
//! The remote side is a trait (`RemoteCalendar`); the engine itself carries
//! no network code.

pub mod apply;
pub mod canonical;
pub mod config;
pub mod error;
pub mod event;
pub mod exceptions;
pub mod identity;
pub mod plan;
pub mod remote;
pub mod source;
pub mod sync;
pub mod timezone;
pub mod window;

pub use apply::SyncReport;
pub use config::SyncConfig;
pub use error::{RemoteReason, SyncError, SyncResult};
pub use event::{CanonicalEvent, EventTime, RemoteCalendarInfo, RemoteEvent};
pub use remote::{EventPage, RemoteCalendar};
