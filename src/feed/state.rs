//! In-memory contents of one notification feed.

use crate::errors::AppError;
use crate::models::{ChangeEvent, NotificationRecord, ReadPatch};

/// Capped, newest-first list of one subscriber's notifications.
///
/// Records are unique by id, ordered by `created_at` descending and never
/// exceed `limit`. Every record belongs to `subscriber_id`.
#[derive(Debug)]
pub struct FeedState {
    subscriber_id: Option<String>,
    records: Vec<NotificationRecord>,
    limit: usize,
    loading: bool,
    error: Option<AppError>,
}

impl FeedState {
    pub fn new(limit: usize) -> Self {
        Self {
            subscriber_id: None,
            records: Vec::new(),
            limit,
            loading: false,
            error: None,
        }
    }

    pub fn subscriber_id(&self) -> Option<&str> {
        self.subscriber_id.as_deref()
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_read).count()
    }

    pub fn unread_ids(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| !r.is_read)
            .map(|r| r.id.clone())
            .collect()
    }

    fn owns(&self, subscriber_id: &str) -> bool {
        self.subscriber_id.as_deref() == Some(subscriber_id)
    }

    /// Discard everything and switch to `subscriber_id`.
    pub fn reset(&mut self, subscriber_id: Option<String>) {
        self.subscriber_id = subscriber_id;
        self.records.clear();
        self.loading = false;
        self.error = None;
    }

    pub fn begin_loading(&mut self, subscriber_id: &str) {
        if self.owns(subscriber_id) {
            self.loading = true;
            self.error = None;
        }
    }

    /// Replace the feed with a fetch result. Returns false when the result
    /// belongs to a subscriber that is no longer current.
    pub fn replace(&mut self, subscriber_id: &str, mut records: Vec<NotificationRecord>) -> bool {
        if !self.owns(subscriber_id) {
            return false;
        }
        records.retain(|r| r.subscriber_id == subscriber_id);
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = std::collections::HashSet::new();
        records.retain(|r| seen.insert(r.id.clone()));
        records.truncate(self.limit);

        self.records = records;
        self.loading = false;
        self.error = None;
        true
    }

    /// Record a failed fetch: the feed is cleared and the error kept.
    pub fn fail(&mut self, subscriber_id: &str, error: AppError) -> bool {
        if !self.owns(subscriber_id) {
            return false;
        }
        self.records.clear();
        self.loading = false;
        self.error = Some(error);
        true
    }

    /// Apply a pushed change. Returns the record when an insert added it.
    pub fn apply(&mut self, event: ChangeEvent) -> Option<&NotificationRecord> {
        match event {
            ChangeEvent::Insert(record) => {
                if !self.owns(&record.subscriber_id)
                    || self.records.iter().any(|r| r.id == record.id)
                {
                    return None;
                }
                // Normally index 0; a late insert still lands in order
                let position = self
                    .records
                    .iter()
                    .position(|r| r.created_at <= record.created_at)
                    .unwrap_or(self.records.len());
                if position >= self.limit {
                    return None;
                }
                self.records.insert(position, record);
                self.records.truncate(self.limit);
                self.records.get(position)
            }
            ChangeEvent::Update(record) => {
                if let Some(existing) = self.records.iter_mut().find(|r| r.id == record.id) {
                    *existing = record;
                }
                None
            }
            ChangeEvent::Delete { id } => {
                self.remove(&id);
                None
            }
        }
    }

    pub fn mark_read(&mut self, id: &str, patch: &ReadPatch) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.apply(patch);
        }
    }

    pub fn mark_many_read(&mut self, ids: &[String], patch: &ReadPatch) {
        for record in self.records.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.apply(patch);
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.records.retain(|r| r.id != id);
    }
}
