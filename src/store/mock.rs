//! Scripted in-memory store for feed tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use super::{FeedSender, NotificationStore, SubscriptionHandle};
use crate::errors::AppError;
use crate::models::{
    ChangeEvent, ChannelStatus, FeedMessage, NotificationKind, NotificationRecord, Payload,
    ReadPatch, SoundHint,
};
use crate::sound::Notifier;

pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

pub fn record(subscriber_id: &str, id: &str, created_at: DateTime<Utc>) -> NotificationRecord {
    NotificationRecord {
        id: id.to_string(),
        subscriber_id: subscriber_id.to_string(),
        kind: NotificationKind::NewBooking,
        title: format!("Notification {}", id),
        body: String::new(),
        payload: Payload::new(),
        is_read: false,
        read_at: None,
        created_at,
        updated_at: created_at,
    }
}

#[derive(Default)]
struct MockInner {
    records: Vec<NotificationRecord>,
    fail_fetch: bool,
    fail_mutations: bool,
    fail_subscribe: bool,
    confirm_on_subscribe: bool,
    fetch_calls: usize,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    batch_updates: Vec<Vec<String>>,
    sender: Option<FeedSender>,
    held_fetches: HashMap<String, Arc<Notify>>,
}

/// Store double whose subscriptions are driven by the test.
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockInner>>,
}

impl MockStore {
    pub fn new(records: Vec<NotificationRecord>) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().records = records;
        store
    }

    /// Report `subscribed` as soon as a subscription is opened.
    pub fn confirming(self) -> Self {
        self.inner.lock().unwrap().confirm_on_subscribe = true;
        self
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.inner.lock().unwrap().fail_fetch = fail;
    }

    pub fn set_fail_mutations(&self, fail: bool) {
        self.inner.lock().unwrap().fail_mutations = fail;
    }

    /// Park fetches for `subscriber_id` until the returned gate is notified.
    pub fn hold_fetches(&self, subscriber_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner
            .lock()
            .unwrap()
            .held_fetches
            .insert(subscriber_id.to_string(), gate.clone());
        gate
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.inner.lock().unwrap().fail_subscribe = fail;
    }

    pub fn fetch_calls(&self) -> usize {
        self.inner.lock().unwrap().fetch_calls
    }

    pub fn subscribe_calls(&self) -> usize {
        self.inner.lock().unwrap().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.inner.lock().unwrap().unsubscribe_calls
    }

    pub fn active_subscriptions(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.subscribe_calls - inner.unsubscribe_calls
    }

    pub fn batch_updates(&self) -> Vec<Vec<String>> {
        self.inner.lock().unwrap().batch_updates.clone()
    }

    /// Deliver a message on the most recent subscription.
    pub fn push(&self, message: FeedMessage) {
        let inner = self.inner.lock().unwrap();
        if let Some(sender) = &inner.sender {
            let _ = sender.send(message);
        }
    }

    pub fn push_status(&self, status: ChannelStatus) {
        self.push(FeedMessage::Status(status));
    }

    pub fn push_insert(&self, record: NotificationRecord) {
        self.inner.lock().unwrap().records.push(record.clone());
        self.push(FeedMessage::Change(ChangeEvent::Insert(record)));
    }
}

#[async_trait]
impl NotificationStore for MockStore {
    async fn fetch_records(
        &self,
        subscriber_id: &str,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.fetch_calls += 1;
            inner.held_fetches.get(subscriber_id).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let inner = self.inner.lock().unwrap();
        if inner.fail_fetch {
            return Err(AppError::Database("fetch failed".to_string()));
        }
        let mut records: Vec<_> = inner
            .records
            .iter()
            .filter(|r| r.subscriber_id == subscriber_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn subscribe(
        &self,
        subscriber_id: &str,
        sender: FeedSender,
    ) -> Result<SubscriptionHandle, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_subscribe {
            return Err(AppError::Unavailable("realtime unavailable".to_string()));
        }
        inner.subscribe_calls += 1;
        if inner.confirm_on_subscribe {
            let _ = sender.send(FeedMessage::Status(ChannelStatus::Subscribed));
        }
        inner.sender = Some(sender);
        Ok(SubscriptionHandle::new(subscriber_id))
    }

    async fn unsubscribe(&self, _handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().unwrap();
        inner.unsubscribe_calls += 1;
        inner.sender = None;
    }

    async fn update_record(
        &self,
        id: &str,
        subscriber_id: &str,
        patch: ReadPatch,
    ) -> Result<NotificationRecord, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_mutations {
            return Err(AppError::Database("update failed".to_string()));
        }
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id && r.subscriber_id == subscriber_id)
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;
        record.apply(&patch);
        Ok(record.clone())
    }

    async fn update_records(
        &self,
        ids: &[String],
        subscriber_id: &str,
        patch: ReadPatch,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_mutations {
            return Err(AppError::Database("batch update failed".to_string()));
        }
        inner.batch_updates.push(ids.to_vec());
        for record in inner
            .records
            .iter_mut()
            .filter(|r| r.subscriber_id == subscriber_id && ids.contains(&r.id))
        {
            record.apply(&patch);
        }
        Ok(())
    }

    async fn delete_record(&self, id: &str, subscriber_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_mutations {
            return Err(AppError::Database("delete failed".to_string()));
        }
        inner
            .records
            .retain(|r| !(r.id == id && r.subscriber_id == subscriber_id));
        Ok(())
    }
}

/// Notifier double that records every alert it is asked for.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<(String, SoundHint)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, SoundHint)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subscriber_id: &str, hint: SoundHint) -> Result<(), AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((subscriber_id.to_string(), hint));
        if self.fail {
            return Err(AppError::Unavailable("no audio output".to_string()));
        }
        Ok(())
    }
}
