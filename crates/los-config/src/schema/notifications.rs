//! Toast and sound settings for incoming domain events.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub sound_enabled: bool,
    /// Sound file to play; empty rings the terminal bell instead.
    pub sound_file: String,
    /// Maximum queued toasts (valid range: 1-256).
    pub toast_capacity: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            sound_file: String::new(),
            toast_capacity: 16,
        }
    }
}
