//! Notification preferences of a professional account.

use serde::{Deserialize, Serialize};

/// Sound and vibration preferences; both default to enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalSettings {
    pub professional_id: String,
    pub notification_sound_enabled: bool,
    pub notification_vibration_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ProfessionalSettings {
    /// Preferences used when no settings row exists.
    pub fn defaults_for(professional_id: &str) -> Self {
        Self {
            professional_id: professional_id.to_string(),
            notification_sound_enabled: true,
            notification_vibration_enabled: true,
            updated_at: None,
        }
    }
}

/// Request body for updating preferences.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub notification_sound_enabled: Option<bool>,
    #[serde(default)]
    pub notification_vibration_enabled: Option<bool>,
}
