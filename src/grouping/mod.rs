//! Collapse bursts of same-kind notifications into groups.

use std::collections::HashSet;

use chrono::SecondsFormat;

use crate::models::{GroupedEntry, NotificationGroup, NotificationKind, NotificationRecord};

/// Default window in hours within which same-kind notifications are grouped.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

const GROUPABLE: [NotificationKind; 5] = [
    NotificationKind::NewBooking,
    NotificationKind::BookingConfirmed,
    NotificationKind::BookingCancelled,
    NotificationKind::NewClient,
    NotificationKind::NewReview,
];

fn group_title(kind: NotificationKind, count: usize) -> String {
    match kind {
        NotificationKind::NewBooking => format!("{} new bookings", count),
        NotificationKind::BookingConfirmed => format!("{} confirmed bookings", count),
        NotificationKind::BookingCancelled => format!("{} cancelled bookings", count),
        NotificationKind::NewClient => format!("{} new clients", count),
        NotificationKind::NewReview => format!("{} new reviews", count),
        _ => format!("{} notifications", count),
    }
}

/// Group `records` (newest first) by kind and time window.
///
/// Each groupable record gathers every later record of the same kind created
/// within `window_hours` (whole hours, either direction) of itself. Gathers
/// of one stay single entries; the list keeps the position of the first
/// member.
pub fn group_notifications(
    records: &[NotificationRecord],
    window_hours: i64,
) -> Vec<GroupedEntry> {
    let mut result = Vec::new();
    let mut processed: HashSet<&str> = HashSet::new();

    for (i, record) in records.iter().enumerate() {
        if processed.contains(record.id.as_str()) {
            continue;
        }
        processed.insert(&record.id);

        if !GROUPABLE.contains(&record.kind) {
            result.push(GroupedEntry::Single(record.clone()));
            continue;
        }

        let mut members = vec![record.clone()];
        for other in &records[i + 1..] {
            if processed.contains(other.id.as_str()) || other.kind != record.kind {
                continue;
            }
            let hours = (record.created_at - other.created_at).num_hours().abs();
            if hours <= window_hours {
                processed.insert(&other.id);
                members.push(other.clone());
            }
        }

        if members.len() == 1 {
            result.push(GroupedEntry::Single(record.clone()));
            continue;
        }

        members.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let latest_date = members[0].created_at;
        result.push(GroupedEntry::Group(NotificationGroup {
            id: format!(
                "group-{}-{}",
                record.kind.as_str(),
                record
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            kind: record.kind,
            title: group_title(record.kind, members.len()),
            count: members.len(),
            latest_date,
            is_read: members.iter().all(|m| m.is_read),
            notifications: members,
        }));
    }

    result
}
