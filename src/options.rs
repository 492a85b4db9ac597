use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;

/// Options for a viewer session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    /// Cadence of held prev/next stepping in milliseconds (default: 20)
    #[serde(default = "default_repeat_interval_ms")]
    pub repeat_interval_ms: u32,

    /// Include elevation as the 3rd coordinate value (default: true)
    #[serde(default = "default_true")]
    pub include_elevation: bool,

    /// Offset used when formatting row timestamps (default: local time)
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,

    /// chrono format string for row timestamps
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            repeat_interval_ms: default_repeat_interval_ms(),
            include_elevation: true,
            utc_offset_minutes: None,
            timestamp_format: default_timestamp_format(),
        }
    }
}

impl ViewerOptions {
    pub fn repeat_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.repeat_interval_ms.max(1)))
    }

    /// Offset for row timestamps. Falls back to the browser's local offset on
    /// wasm and to UTC elsewhere.
    pub fn display_offset(&self) -> FixedOffset {
        let minutes = self.utc_offset_minutes.unwrap_or_else(local_offset_minutes);
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[cfg(target_arch = "wasm32")]
fn local_offset_minutes() -> i32 {
    // getTimezoneOffset is UTC minus local, in minutes.
    -(js_sys::Date::new_0().get_timezone_offset() as i32)
}

#[cfg(not(target_arch = "wasm32"))]
fn local_offset_minutes() -> i32 {
    0
}

fn default_repeat_interval_ms() -> u32 {
    20
}

fn default_timestamp_format() -> String {
    "%Y/%m/%d %H:%M:%S".to_string()
}

fn default_true() -> bool {
    true
}
