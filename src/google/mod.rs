//! Google Calendar remote collaborator (Calendar v3 REST surface).

mod api;
mod wire;

pub use api::GoogleRemote;
