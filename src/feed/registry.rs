//! One live feed per professional, started on first use.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::NotificationFeed;
use crate::config::FeedSettings;
use crate::sound::Notifier;
use crate::store::NotificationStore;

pub struct FeedRegistry<S: NotificationStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    settings: FeedSettings,
    feeds: Mutex<HashMap<String, Arc<NotificationFeed<S>>>>,
}

impl<S: NotificationStore> FeedRegistry<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, settings: FeedSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
            feeds: Mutex::new(HashMap::new()),
        }
    }

    /// Feed of `professional_id`, starting it if needed.
    ///
    /// The registry lock is released before the initial fetch, so a slow
    /// store only holds up callers of the same feed.
    pub async fn get_or_start(&self, professional_id: &str) -> Arc<NotificationFeed<S>> {
        let feed = {
            let mut feeds = self.feeds.lock().await;
            if let Some(feed) = feeds.get(professional_id) {
                return feed.clone();
            }
            let feed = Arc::new(NotificationFeed::new(
                self.store.clone(),
                self.notifier.clone(),
                self.settings.clone(),
            ));
            feeds.insert(professional_id.to_string(), feed.clone());
            feed
        };

        feed.set_subscriber(Some(professional_id.to_string())).await;

        // Stopped while starting: do not leave a worker behind
        let still_registered = self
            .feeds
            .lock()
            .await
            .get(professional_id)
            .is_some_and(|current| Arc::ptr_eq(current, &feed));
        if !still_registered {
            feed.teardown().await;
        }
        feed
    }

    /// Tear down the feed of `professional_id`. Returns whether one was live.
    pub async fn stop(&self, professional_id: &str) -> bool {
        let feed = self.feeds.lock().await.remove(professional_id);
        match feed {
            Some(feed) => {
                feed.teardown().await;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.feeds.lock().await.len()
    }

    /// Tear down every feed.
    pub async fn shutdown(&self) {
        let feeds: Vec<_> = self.feeds.lock().await.drain().map(|(_, f)| f).collect();
        tracing::info!("Stopping {} notification feeds", feeds.len());
        for feed in feeds {
            feed.teardown().await;
        }
    }
}
