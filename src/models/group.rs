//! Grouped view of a notification list.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{NotificationKind, NotificationRecord};

/// Several notifications of one kind collapsed into a single entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGroup {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub notifications: Vec<NotificationRecord>,
    pub count: usize,
    pub latest_date: DateTime<Utc>,
    pub is_read: bool,
}

/// One entry of a grouped list.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum GroupedEntry {
    Single(NotificationRecord),
    Group(NotificationGroup),
}
