//! Connection state machine for a feed's change subscription.
//!
//! ```text
//! Disconnected -> Connecting -> Subscribed
//!                 Connecting -> Retrying -> Connecting   (retry < max)
//!                 Connecting -> Polling                  (retries exhausted, terminal)
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::models::ChannelStatus;

/// Longest wait between two subscription attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Subscribed,
    Retrying,
    Polling,
}

/// What the feed worker has to do after a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changes (stale or duplicate status)
    Ignore,
    /// The subscription is live
    Subscribed,
    /// Drop the subscription and try again after the delay
    Reconnect(Duration),
    /// Drop the subscription and poll from now on
    StartPolling,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    state: ConnectionState,
    retry_count: u32,
    max_retries: u32,
    base_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_count: 0,
            max_retries,
            base_delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether a new subscription attempt may start.
    pub fn can_connect(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Retrying
        )
    }

    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Delay before the `attempt`-th reconnect (1-based): base, 2×base, 4×base...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }

    pub fn on_status(&mut self, status: ChannelStatus) -> Transition {
        match (status, self.state) {
            (ChannelStatus::Subscribed, ConnectionState::Connecting) => {
                self.state = ConnectionState::Subscribed;
                self.retry_count = 0;
                Transition::Subscribed
            }
            (
                ChannelStatus::Error | ChannelStatus::Timeout,
                ConnectionState::Connecting | ConnectionState::Subscribed,
            ) => {
                if self.retry_count < self.max_retries {
                    self.retry_count += 1;
                    self.state = ConnectionState::Retrying;
                    Transition::Reconnect(self.delay_for(self.retry_count))
                } else {
                    self.state = ConnectionState::Polling;
                    Transition::StartPolling
                }
            }
            _ => Transition::Ignore,
        }
    }

    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.retry_count = 0;
    }
}
