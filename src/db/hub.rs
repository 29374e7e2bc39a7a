//! In-process fan-out of committed row changes.

use tokio::sync::broadcast;

use crate::models::ChangeEvent;

/// Buffered changes per receiver before it is considered lagging.
const HUB_CAPACITY: usize = 256;

/// A change tagged with the account that owns the row.
#[derive(Debug, Clone)]
pub struct RowChange {
    pub professional_id: String,
    pub event: ChangeEvent,
}

/// Broadcasts every committed change to all attached listeners.
#[derive(Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<RowChange>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    /// Attach a listener; it sees only changes published after this call.
    pub fn listen(&self) -> broadcast::Receiver<RowChange> {
        self.sender.subscribe()
    }

    pub fn publish(&self, professional_id: &str, event: ChangeEvent) {
        tracing::debug!(
            professional_id,
            notification_id = event.id(),
            "publishing row change"
        );
        // No listeners is not an error
        let _ = self.sender.send(RowChange {
            professional_id: professional_id.to_string(),
            event,
        });
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}
