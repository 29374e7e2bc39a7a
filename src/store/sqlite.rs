//! Notification store backed by the SQLite repository and its change hub.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;

use super::{FeedSender, NotificationStore, SubscriptionHandle};
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{ChannelStatus, FeedMessage, NotificationRecord, ReadPatch};

#[derive(Clone)]
pub struct SqliteNotificationStore {
    repo: Arc<Repository>,
}

impl SqliteNotificationStore {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl NotificationStore for SqliteNotificationStore {
    async fn fetch_records(
        &self,
        subscriber_id: &str,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        self.repo.list_notifications(subscriber_id, limit).await
    }

    async fn subscribe(
        &self,
        subscriber_id: &str,
        sender: FeedSender,
    ) -> Result<SubscriptionHandle, AppError> {
        // Attach before reporting subscribed so no committed change is missed
        let mut changes = self.repo.hub().listen();
        let handle = SubscriptionHandle::new(subscriber_id);
        let subscription_id = handle.id();
        let owner = subscriber_id.to_string();

        let task = tokio::spawn(async move {
            if sender
                .send(FeedMessage::Status(ChannelStatus::Subscribed))
                .is_err()
            {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(change) if change.professional_id == owner => {
                        if sender.send(FeedMessage::Change(change.event)).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            %subscription_id,
                            subscriber_id = %owner,
                            skipped,
                            "Change subscription lagged behind the hub"
                        );
                        let _ = sender.send(FeedMessage::Status(ChannelStatus::Error));
                        break;
                    }
                    Err(RecvError::Closed) => {
                        let _ = sender.send(FeedMessage::Status(ChannelStatus::Error));
                        break;
                    }
                }
            }
        });

        tracing::debug!(%subscription_id, subscriber_id, "Change subscription opened");
        Ok(handle.with_task(task))
    }

    async fn unsubscribe(&self, mut handle: SubscriptionHandle) {
        tracing::debug!(
            subscription_id = %handle.id(),
            subscriber_id = handle.subscriber_id(),
            "Change subscription closed"
        );
        handle.release();
    }

    async fn update_record(
        &self,
        id: &str,
        subscriber_id: &str,
        patch: ReadPatch,
    ) -> Result<NotificationRecord, AppError> {
        self.repo.mark_read(subscriber_id, id, patch.read_at).await
    }

    async fn update_records(
        &self,
        ids: &[String],
        subscriber_id: &str,
        patch: ReadPatch,
    ) -> Result<(), AppError> {
        self.repo
            .mark_many_read(subscriber_id, ids, patch.read_at)
            .await
            .map(|_| ())
    }

    async fn delete_record(&self, id: &str, subscriber_id: &str) -> Result<(), AppError> {
        self.repo.delete_notification(subscriber_id, id).await
    }
}
