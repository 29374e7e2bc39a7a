//! Data models for the notification backend.
//!
//! Field names on the wire match the frontend TypeScript interfaces.

mod event;
mod group;
mod notification;
mod settings;

pub use event::*;
pub use group::*;
pub use notification::*;
pub use settings::*;
