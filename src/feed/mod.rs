//! Live notification feed for one professional.
//!
//! A [`NotificationFeed`] fetches the most recent notifications, then keeps
//! them current through a change subscription. A single worker task owns the
//! subscription, the reconnect timer and the polling interval, and applies
//! pushed messages in delivery order. Mutations run on the caller's task and
//! touch the in-memory list only after the store has confirmed them.

mod reconnect;
mod registry;
mod state;

pub use reconnect::*;
pub use registry::*;
pub use state::*;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::FeedSettings;
use crate::errors::AppError;
use crate::models::{ChannelStatus, FeedMessage, NotificationRecord, ReadPatch};
use crate::sound::Notifier;
use crate::store::{NotificationStore, SubscriptionHandle};

/// Point-in-time view of a feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub professional_id: Option<String>,
    pub notifications: Vec<NotificationRecord>,
    pub unread_count: usize,
    pub is_loading: bool,
    pub error: Option<String>,
    pub connection: ConnectionState,
}

/// State shared between the feed handle and its worker.
struct Shared {
    state: RwLock<FeedState>,
    connection: RwLock<ConnectionState>,
}

struct WorkerSlot {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct NotificationFeed<S: NotificationStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    settings: FeedSettings,
    shared: Arc<Shared>,
    worker: Mutex<Option<WorkerSlot>>,
}

impl<S: NotificationStore> NotificationFeed<S> {
    /// Create a feed with no subscriber; nothing touches the store yet.
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, settings: FeedSettings) -> Self {
        let settings = settings.sanitized();
        let shared = Arc::new(Shared {
            state: RwLock::new(FeedState::new(settings.limit)),
            connection: RwLock::new(ConnectionState::Disconnected),
        });
        Self {
            store,
            notifier,
            settings,
            shared,
            worker: Mutex::new(None),
        }
    }

    /// Point the feed at a subscriber, or at nobody.
    ///
    /// Any previous subscriber is torn down first. Setting the subscriber
    /// that is already live does nothing.
    pub async fn set_subscriber(&self, subscriber_id: Option<String>) {
        let mut worker = self.worker.lock().await;

        let current = self
            .shared
            .state
            .read()
            .await
            .subscriber_id()
            .map(str::to_owned);
        if worker.is_some() && current == subscriber_id {
            return;
        }

        stop_worker(&mut worker).await;
        self.shared.state.write().await.reset(subscriber_id.clone());

        let Some(subscriber_id) = subscriber_id else {
            return;
        };

        tracing::info!(subscriber_id = %subscriber_id, "Starting notification feed");
        load(
            self.store.as_ref(),
            &self.shared,
            &subscriber_id,
            self.settings.limit,
            true,
        )
        .await;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let runner = Worker {
            store: self.store.clone(),
            notifier: self.notifier.clone(),
            shared: self.shared.clone(),
            settings: self.settings.clone(),
            policy: ReconnectPolicy::new(
                self.settings.max_retries,
                self.settings.retry_base_delay,
            ),
            subscriber_id,
            handle: None,
            messages: None,
            reconnect_at: None,
            subscribe_deadline: None,
            poll: None,
        };
        let task = tokio::spawn(runner.run(shutdown_rx));
        *worker = Some(WorkerSlot { shutdown, task });
    }

    /// Stop live updates and clear the feed. Safe to call repeatedly.
    pub async fn teardown(&self) {
        self.set_subscriber(None).await;
    }

    pub async fn subscriber_id(&self) -> Option<String> {
        self.shared
            .state
            .read()
            .await
            .subscriber_id()
            .map(str::to_owned)
    }

    pub async fn notifications(&self) -> Vec<NotificationRecord> {
        self.shared.state.read().await.records().to_vec()
    }

    pub async fn unread_count(&self) -> usize {
        self.shared.state.read().await.unread_count()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.shared.connection.read().await
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.shared.state.read().await;
        FeedSnapshot {
            professional_id: state.subscriber_id().map(str::to_owned),
            notifications: state.records().to_vec(),
            unread_count: state.unread_count(),
            is_loading: state.is_loading(),
            error: state.error().map(|e| e.message()),
            connection: *self.shared.connection.read().await,
        }
    }

    /// Re-run the bulk fetch. Failures are recorded on the feed, not returned.
    pub async fn refresh(&self) {
        match self.subscriber_id().await {
            Some(subscriber_id) => {
                load(
                    self.store.as_ref(),
                    &self.shared,
                    &subscriber_id,
                    self.settings.limit,
                    true,
                )
                .await
            }
            None => self.shared.state.write().await.reset(None),
        }
    }

    /// Mark one notification read once the store has accepted the change.
    pub async fn mark_as_read(&self, id: &str) -> Result<(), AppError> {
        let Some(subscriber_id) = self.subscriber_id().await else {
            return Ok(());
        };

        let patch = ReadPatch::now();
        self.store
            .update_record(id, &subscriber_id, patch)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    subscriber_id = %subscriber_id,
                    id,
                    "Failed to mark notification read: {}",
                    e
                )
            })?;

        let mut state = self.shared.state.write().await;
        if state.subscriber_id() == Some(subscriber_id.as_str()) {
            state.mark_read(id, &patch);
        }
        Ok(())
    }

    /// Mark every currently unread notification read in one batch.
    pub async fn mark_all_as_read(&self) -> Result<(), AppError> {
        let (subscriber_id, ids) = {
            let state = self.shared.state.read().await;
            match state.subscriber_id() {
                Some(subscriber_id) => (subscriber_id.to_owned(), state.unread_ids()),
                None => return Ok(()),
            }
        };
        if ids.is_empty() {
            return Ok(());
        }

        let patch = ReadPatch::now();
        self.store
            .update_records(&ids, &subscriber_id, patch)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    subscriber_id = %subscriber_id,
                    count = ids.len(),
                    "Failed to mark notifications read: {}",
                    e
                )
            })?;

        let mut state = self.shared.state.write().await;
        if state.subscriber_id() == Some(subscriber_id.as_str()) {
            state.mark_many_read(&ids, &patch);
        }
        Ok(())
    }

    /// Delete a notification once the store has accepted the delete.
    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        let Some(subscriber_id) = self.subscriber_id().await else {
            return Ok(());
        };

        self.store
            .delete_record(id, &subscriber_id)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    subscriber_id = %subscriber_id,
                    id,
                    "Failed to remove notification: {}",
                    e
                )
            })?;

        let mut state = self.shared.state.write().await;
        if state.subscriber_id() == Some(subscriber_id.as_str()) {
            state.remove(id);
        }
        Ok(())
    }
}

impl<S: NotificationStore> Drop for NotificationFeed<S> {
    fn drop(&mut self) {
        // The worker unsubscribes on its own once signalled
        if let Ok(mut worker) = self.worker.try_lock() {
            if let Some(slot) = worker.take() {
                let _ = slot.shutdown.send(true);
            }
        }
    }
}

async fn stop_worker(worker: &mut Option<WorkerSlot>) {
    if let Some(slot) = worker.take() {
        let _ = slot.shutdown.send(true);
        if let Err(e) = slot.task.await {
            tracing::warn!("Feed worker ended abnormally: {}", e);
        }
    }
}

/// Bulk fetch into the shared state. Results for a subscriber that is no
/// longer current are dropped.
async fn load<S: NotificationStore>(
    store: &S,
    shared: &Shared,
    subscriber_id: &str,
    limit: usize,
    show_loading: bool,
) {
    if show_loading {
        shared.state.write().await.begin_loading(subscriber_id);
    }

    let result = store.fetch_records(subscriber_id, limit).await;

    let mut state = shared.state.write().await;
    let applied = match result {
        Ok(records) => state.replace(subscriber_id, records),
        Err(e) => {
            tracing::error!(subscriber_id, "Failed to fetch notifications: {}", e);
            state.fail(subscriber_id, e)
        }
    };
    if !applied {
        tracing::debug!(subscriber_id, "Discarding fetch for previous subscriber");
    }
}

/// Owns everything with a lifetime tied to one subscriber.
struct Worker<S: NotificationStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    shared: Arc<Shared>,
    settings: FeedSettings,
    policy: ReconnectPolicy,
    subscriber_id: String,
    handle: Option<SubscriptionHandle>,
    messages: Option<mpsc::UnboundedReceiver<FeedMessage>>,
    reconnect_at: Option<Instant>,
    subscribe_deadline: Option<Instant>,
    poll: Option<Interval>,
}

impl<S: NotificationStore> Worker<S> {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.connect().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                message = next_message(&mut self.messages) => match message {
                    Some(FeedMessage::Status(status)) => self.on_status(status).await,
                    Some(FeedMessage::Change(event)) => self.on_change(event).await,
                    None => {
                        // The store dropped its end of the channel
                        self.messages = None;
                        self.on_status(ChannelStatus::Error).await;
                    }
                },
                _ = sleep_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.connect().await;
                }
                _ = sleep_until(self.subscribe_deadline) => {
                    self.subscribe_deadline = None;
                    tracing::warn!(subscriber_id = %self.subscriber_id, "Subscription timed out");
                    self.on_status(ChannelStatus::Timeout).await;
                }
                _ = tick(&mut self.poll) => {
                    tracing::debug!(subscriber_id = %self.subscriber_id, "Polling notifications");
                    load(
                        self.store.as_ref(),
                        &self.shared,
                        &self.subscriber_id,
                        self.settings.limit,
                        false,
                    )
                    .await;
                }
            }
        }

        self.release().await;
        self.poll = None;
        self.reconnect_at = None;
        self.policy.reset();
        self.publish_state().await;
        tracing::info!(subscriber_id = %self.subscriber_id, "Notification feed stopped");
    }

    /// Open a subscription unless one is already live or pending.
    async fn connect(&mut self) {
        if !self.policy.can_connect() {
            return;
        }
        self.release().await;
        self.policy.begin_connect();
        self.publish_state().await;

        let (sender, receiver) = mpsc::unbounded_channel();
        match self.store.subscribe(&self.subscriber_id, sender).await {
            Ok(handle) => {
                self.handle = Some(handle);
                self.messages = Some(receiver);
                self.subscribe_deadline = Some(Instant::now() + self.settings.subscribe_timeout);
            }
            Err(e) => {
                tracing::warn!(subscriber_id = %self.subscriber_id, "Failed to open subscription: {}", e);
                self.on_status(ChannelStatus::Error).await;
            }
        }
    }

    async fn on_status(&mut self, status: ChannelStatus) {
        match self.policy.on_status(status) {
            Transition::Ignore => return,
            Transition::Subscribed => {
                self.subscribe_deadline = None;
                tracing::info!(subscriber_id = %self.subscriber_id, "Subscription active");
            }
            Transition::Reconnect(delay) => {
                self.release().await;
                self.reconnect_at = Some(Instant::now() + delay);
                tracing::warn!(
                    subscriber_id = %self.subscriber_id,
                    attempt = self.policy.retry_count(),
                    max = self.settings.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Subscription {:?}, reconnecting",
                    status
                );
            }
            Transition::StartPolling => {
                self.release().await;
                self.reconnect_at = None;
                let period = self.settings.poll_interval;
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.poll = Some(interval);
                tracing::error!(
                    subscriber_id = %self.subscriber_id,
                    interval_secs = period.as_secs(),
                    "Max retries reached, falling back to polling"
                );
            }
        }
        self.publish_state().await;
    }

    async fn on_change(&mut self, event: crate::models::ChangeEvent) {
        let inserted = {
            let mut state = self.shared.state.write().await;
            state
                .apply(event)
                .filter(|record| !record.is_read)
                .map(|record| record.kind.sound_hint())
        };

        if let Some(hint) = inserted {
            let notifier = self.notifier.clone();
            let subscriber_id = self.subscriber_id.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&subscriber_id, hint).await {
                    tracing::warn!(subscriber_id = %subscriber_id, "Notification alert failed: {}", e);
                }
            });
        }
    }

    /// Drop the current subscription, if any.
    async fn release(&mut self) {
        self.messages = None;
        self.subscribe_deadline = None;
        if let Some(handle) = self.handle.take() {
            self.store.unsubscribe(handle).await;
        }
    }

    async fn publish_state(&self) {
        *self.shared.connection.write().await = self.policy.state();
    }
}

async fn next_message(
    messages: &mut Option<mpsc::UnboundedReceiver<FeedMessage>>,
) -> Option<FeedMessage> {
    match messages {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
