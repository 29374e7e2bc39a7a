//! Change events pushed from the store to live feeds.

use serde::Serialize;

use super::NotificationRecord;

/// A committed change to one notification row.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(NotificationRecord),
    Update(NotificationRecord),
    Delete { id: String },
}

impl ChangeEvent {
    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::Insert(record) | ChangeEvent::Update(record) => &record.id,
            ChangeEvent::Delete { id } => id,
        }
    }
}

/// State reported by a change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Subscribed,
    Error,
    Timeout,
}

/// Everything a subscription delivers, on one ordered channel.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    Status(ChannelStatus),
}
