//! Voice channel status updates
//!
//! Renders a "now playing" line for each started track and pushes it to a
//! [`StatusSink`]. Updates are rate limited; clearing the status on stop or
//! destroy bypasses the limit.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use streamify_core::{StatusSink, Track};
use tokio::time::Instant;
use tracing::debug;

const DEFAULT_TEMPLATE: &str = "🎶 Now Playing: {title} - {artist} | Requested by: {requester}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoiceStatusConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Supports `{title}`, `{artist}` and `{requester}`
    #[serde(default = "default_template")]
    pub template: String,

    /// Minimum time between unforced updates
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for VoiceStatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            template: default_template(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_throttle_ms() -> u64 {
    5 * 60 * 1000
}

/// Fill in the status template for `track`
pub fn render_status(template: &str, track: &Track) -> String {
    let artist = if track.author.is_empty() {
        "Unknown"
    } else {
        track.author.as_str()
    };
    let requester = track.requested_by.as_deref().unwrap_or("Autoplay");

    template
        .replace("{title}", &track.title)
        .replace("{artist}", artist)
        .replace("{requester}", requester)
}

/// Per-session status publisher
#[derive(Clone)]
pub struct VoiceStatus {
    session_id: String,
    config: Arc<VoiceStatusConfig>,
    sink: Arc<dyn StatusSink>,
    last_update: Arc<Mutex<Option<Instant>>>,
}

impl VoiceStatus {
    pub fn new(
        session_id: impl Into<String>,
        config: Arc<VoiceStatusConfig>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            sink,
            last_update: Arc::new(Mutex::new(None)),
        }
    }

    /// Publish the now-playing line for `track`
    ///
    /// Returns `false` if disabled or throttled.
    pub fn track_started(&self, track: &Track) -> bool {
        let status = render_status(&self.config.template, track);
        self.update(Some(&status), false)
    }

    /// Clear the status, ignoring the throttle
    pub fn clear(&self) -> bool {
        self.update(None, true)
    }

    fn update(&self, status: Option<&str>, force: bool) -> bool {
        if !self.config.enabled {
            return false;
        }

        let now = Instant::now();
        {
            let mut last = self
                .last_update
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let throttle = Duration::from_millis(self.config.throttle_ms);
            if !force && last.is_some_and(|at| now.duration_since(at) < throttle) {
                debug!(session = %self.session_id, "Voice status update throttled");
                return false;
            }
            *last = Some(now);
        }

        self.sink.set_status(&self.session_id, status);
        true
    }
}
