//! Notification record model matching the frontend ProfessionalNotification interface.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Open key-value payload interpreted only by the UI layer.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Fixed set of notification kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewBooking,
    BookingConfirmed,
    BookingCancelled,
    BookingReminder,
    NewClient,
    NewProject,
    NewReview,
    ReviewResponse,
    Custom,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 9] = [
        NotificationKind::NewBooking,
        NotificationKind::BookingConfirmed,
        NotificationKind::BookingCancelled,
        NotificationKind::BookingReminder,
        NotificationKind::NewClient,
        NotificationKind::NewProject,
        NotificationKind::NewReview,
        NotificationKind::ReviewResponse,
        NotificationKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewBooking => "new_booking",
            NotificationKind::BookingConfirmed => "booking_confirmed",
            NotificationKind::BookingCancelled => "booking_cancelled",
            NotificationKind::BookingReminder => "booking_reminder",
            NotificationKind::NewClient => "new_client",
            NotificationKind::NewProject => "new_project",
            NotificationKind::NewReview => "new_review",
            NotificationKind::ReviewResponse => "review_response",
            NotificationKind::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Alert flavour used by the sound/vibration collaborator.
    pub fn sound_hint(&self) -> SoundHint {
        match self {
            NotificationKind::BookingCancelled => SoundHint::Warning,
            NotificationKind::BookingConfirmed | NotificationKind::NewReview => SoundHint::Success,
            _ => SoundHint::Info,
        }
    }
}

/// Flavour of the audible/haptic alert for a new notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SoundHint {
    #[default]
    Default,
    Success,
    Warning,
    Info,
}

/// One notification addressed to a professional account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    #[serde(rename = "professionalId")]
    pub subscriber_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "data", default)]
    pub payload: Payload,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Mark the record read at `at`; an existing `read_at` is kept.
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        self.is_read = true;
        if self.read_at.is_none() {
            self.read_at = Some(at);
        }
    }

    /// Apply a patch confirmed by the store.
    pub fn apply(&mut self, patch: &ReadPatch) {
        self.mark_read(patch.read_at);
    }
}

/// Change written by "mark read" operations: `is_read = true, read_at = at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPatch {
    pub read_at: DateTime<Utc>,
}

impl ReadPatch {
    /// Read mark stamped now, at the precision the store keeps.
    pub fn now() -> Self {
        Self {
            read_at: Utc::now().trunc_subsecs(6),
        }
    }
}

/// Request body for creating a notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    /// Unknown kinds are stored as `custom`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Payload>,
}

impl CreateNotificationRequest {
    pub fn resolved_kind(&self) -> NotificationKind {
        self.kind
            .as_deref()
            .and_then(NotificationKind::from_str)
            .unwrap_or(NotificationKind::Custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in NotificationKind::ALL {
            assert_eq!(NotificationKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::from_str("payment_failed"), None);
    }

    #[test]
    fn test_sound_hint_mapping() {
        assert_eq!(
            NotificationKind::BookingCancelled.sound_hint(),
            SoundHint::Warning
        );
        assert_eq!(
            NotificationKind::BookingConfirmed.sound_hint(),
            SoundHint::Success
        );
        assert_eq!(NotificationKind::NewReview.sound_hint(), SoundHint::Success);
        assert_eq!(NotificationKind::NewBooking.sound_hint(), SoundHint::Info);
        assert_eq!(NotificationKind::Custom.sound_hint(), SoundHint::Info);
    }

    #[test]
    fn test_mark_read_keeps_first_timestamp() {
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        let mut record = NotificationRecord {
            id: "a".to_string(),
            subscriber_id: "pro-1".to_string(),
            kind: NotificationKind::NewBooking,
            title: "New booking".to_string(),
            body: String::new(),
            payload: Payload::new(),
            is_read: false,
            read_at: None,
            created_at: first,
            updated_at: first,
        };

        record.mark_read(first);
        record.mark_read(later);

        assert!(record.is_read);
        assert_eq!(record.read_at, Some(first));
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::json!({
            "id": "a",
            "professionalId": "pro-1",
            "type": "booking_cancelled",
            "title": "Cancelled",
            "message": "Mario cancelled",
            "data": { "bookingId": 7 },
            "isRead": false,
            "readAt": null,
            "createdAt": "2024-01-02T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        });
        let record: NotificationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.kind, NotificationKind::BookingCancelled);
        assert_eq!(record.body, "Mario cancelled");
        assert_eq!(record.payload["bookingId"], 7);
    }

    #[test]
    fn test_unknown_kind_on_create_falls_back_to_custom() {
        let request: CreateNotificationRequest =
            serde_json::from_value(serde_json::json!({ "type": "payment_failed", "title": "x" }))
                .unwrap();
        assert_eq!(request.resolved_kind(), NotificationKind::Custom);
    }
}
