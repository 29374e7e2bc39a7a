//! Boundary between live feeds and the row-store that owns notifications.
//!
//! A feed only ever talks to a [`NotificationStore`]; the SQLite-backed
//! implementation lives in [`sqlite`].

mod sqlite;
#[cfg(test)]
pub mod mock;

pub use sqlite::*;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::models::{FeedMessage, NotificationRecord, ReadPatch};

/// Sending half of a subscription's message channel.
pub type FeedSender = mpsc::UnboundedSender<FeedMessage>;

/// Handle to one live change subscription.
///
/// Dropping the handle without [`NotificationStore::unsubscribe`] still stops
/// any forwarding task it owns.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: uuid::Uuid,
    subscriber_id: String,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(subscriber_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            subscriber_id: subscriber_id.to_string(),
            task: None,
        }
    }

    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    /// Stop the forwarding task, if any.
    pub fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Row-store operations a notification feed relies on.
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Most recent records of a subscriber, newest first.
    async fn fetch_records(
        &self,
        subscriber_id: &str,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, AppError>;

    /// Start delivering status changes and row changes for `subscriber_id`
    /// on `sender`, in the order the store emits them.
    async fn subscribe(
        &self,
        subscriber_id: &str,
        sender: FeedSender,
    ) -> Result<SubscriptionHandle, AppError>;

    async fn unsubscribe(&self, handle: SubscriptionHandle);

    async fn update_record(
        &self,
        id: &str,
        subscriber_id: &str,
        patch: ReadPatch,
    ) -> Result<NotificationRecord, AppError>;

    async fn update_records(
        &self,
        ids: &[String],
        subscriber_id: &str,
        patch: ReadPatch,
    ) -> Result<(), AppError>;

    async fn delete_record(&self, id: &str, subscriber_id: &str) -> Result<(), AppError>;
}
