//! Sound and vibration alerts for newly arrived notifications.
//!
//! Alerts are fire-and-forget: a failure here is logged by the caller and
//! never reaches the feed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{ProfessionalSettings, SoundHint};

/// Vibration pattern in milliseconds: vibrate, pause, vibrate.
pub const VIBRATION_PATTERN: [u64; 3] = [200, 50, 100];

/// Side-effect collaborator triggered for every unread insert.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, subscriber_id: &str, hint: SoundHint) -> Result<(), AppError>;
}

/// A short sine tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration_ms: u64,
}

impl Tone {
    pub fn for_hint(hint: SoundHint) -> Self {
        let (frequency_hz, duration_ms) = match hint {
            SoundHint::Success => (800, 200),
            SoundHint::Warning => (600, 250),
            SoundHint::Info => (700, 150),
            SoundHint::Default => (750, 200),
        };
        Self {
            frequency_hz,
            duration_ms,
        }
    }
}

/// What a device should do for one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPlan {
    pub tone: Option<Tone>,
    pub vibration: Option<Vec<u64>>,
}

impl AlertPlan {
    pub fn for_settings(settings: &ProfessionalSettings, hint: SoundHint) -> Self {
        Self {
            tone: settings
                .notification_sound_enabled
                .then(|| Tone::for_hint(hint)),
            vibration: settings
                .notification_vibration_enabled
                .then(|| VIBRATION_PATTERN.to_vec()),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.tone.is_none() && self.vibration.is_none()
    }
}

/// Notifier honouring the professional's stored preferences.
///
/// There is no audio device on the server; the plan is emitted as a
/// structured `alert` event for whatever forwards it to clients.
#[derive(Clone)]
pub struct AlertService {
    repo: Arc<Repository>,
}

impl AlertService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Notifier for AlertService {
    async fn notify(&self, subscriber_id: &str, hint: SoundHint) -> Result<(), AppError> {
        let settings = self.repo.get_settings(subscriber_id).await?;
        let plan = AlertPlan::for_settings(&settings, hint);

        if plan.is_silent() {
            tracing::debug!(subscriber_id, "Alerts disabled, skipping");
            return Ok(());
        }

        tracing::info!(
            target: "alert",
            subscriber_id,
            hint = ?hint,
            tone = ?plan.tone,
            vibration = ?plan.vibration,
            "Notification alert"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::UpdateSettingsRequest;
    use tempfile::TempDir;

    #[test]
    fn test_tone_per_hint() {
        assert_eq!(Tone::for_hint(SoundHint::Success).frequency_hz, 800);
        assert_eq!(Tone::for_hint(SoundHint::Warning).duration_ms, 250);
        assert_eq!(Tone::for_hint(SoundHint::Info).frequency_hz, 700);
        assert_eq!(Tone::for_hint(SoundHint::Default).frequency_hz, 750);
    }

    #[test]
    fn test_plan_follows_preferences() {
        let mut settings = ProfessionalSettings::defaults_for("pro-1");
        let plan = AlertPlan::for_settings(&settings, SoundHint::Warning);
        assert_eq!(plan.tone, Some(Tone::for_hint(SoundHint::Warning)));
        assert_eq!(plan.vibration, Some(vec![200, 50, 100]));

        settings.notification_sound_enabled = false;
        let plan = AlertPlan::for_settings(&settings, SoundHint::Warning);
        assert!(plan.tone.is_none());
        assert!(!plan.is_silent());

        settings.notification_vibration_enabled = false;
        assert!(AlertPlan::for_settings(&settings, SoundHint::Info).is_silent());
    }

    #[tokio::test]
    async fn test_alert_service_reads_settings() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        let repo = Arc::new(Repository::new(pool));
        repo.upsert_settings(
            "pro-1",
            &UpdateSettingsRequest {
                notification_sound_enabled: Some(false),
                notification_vibration_enabled: Some(false),
            },
        )
        .await
        .unwrap();

        let service = AlertService::new(repo);
        service.notify("pro-1", SoundHint::Info).await.unwrap();
        service.notify("pro-2", SoundHint::Success).await.unwrap();
    }
}
