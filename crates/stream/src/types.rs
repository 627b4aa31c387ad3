//! Core types for the tick stream server.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tickstream_types::constants::{
    DEFAULT_BINDING_ADDRESS, DEFAULT_CURSOR_DELIMITER, DEFAULT_INTERVAL_MS,
    DEFAULT_KEEP_ALIVE_SECS, DEFAULT_MAX_BACKFILL, DEFAULT_PORT, DEFAULT_RETRY_MS,
    DEFAULT_STREAM_TAG,
};

use crate::dataset::DatasetSource;

/// Error types for stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamConfigError {
    #[error("Stream interval must be greater than zero")]
    ZeroInterval,

    #[error("Stream tag must not be empty")]
    EmptyTag,

    #[error("Stream tag '{tag}' must not contain the cursor delimiter '{delimiter}'")]
    DelimiterInTag { tag: String, delimiter: char },

    #[error("Stream tag {0:?} must not contain control characters")]
    ControlCharacterInTag(String),
}

/// Timing and naming of a tick stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Length of one tick (milliseconds)
    pub interval_ms: u64,
    /// Reconnection time advertised to clients (milliseconds)
    pub retry_ms: u64,
    /// Maximum number of ticks replayed for a resuming client
    pub max_backfill: u64,
    /// Event type, also the cursor namespace
    pub tag: String,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            retry_ms: DEFAULT_RETRY_MS,
            max_backfill: DEFAULT_MAX_BACKFILL,
            tag: DEFAULT_STREAM_TAG.to_string(),
        }
    }
}

impl StreamOptions {
    pub fn validate(&self) -> Result<(), StreamConfigError> {
        if self.interval_ms == 0 {
            return Err(StreamConfigError::ZeroInterval);
        }
        if self.tag.is_empty() {
            return Err(StreamConfigError::EmptyTag);
        }
        if self.tag.chars().any(char::is_control) {
            return Err(StreamConfigError::ControlCharacterInTag(self.tag.clone()));
        }
        if self.tag.contains(DEFAULT_CURSOR_DELIMITER) {
            return Err(StreamConfigError::DelimiterInTag {
                tag: self.tag.clone(),
                delimiter: DEFAULT_CURSOR_DELIMITER,
            });
        }
        Ok(())
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    /// The tick whose window contains `now_ms`.
    pub fn tick_at(&self, now_ms: u64) -> u64 {
        now_ms / self.interval_ms
    }

    /// Wall-clock start of a tick window (milliseconds since the epoch).
    pub fn deadline_ms(&self, tick: u64) -> u64 {
        tick.saturating_mul(self.interval_ms)
    }
}

/// A single event produced by a stream session, ready to be framed by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent<R> {
    /// Tick this event was emitted for
    pub tick: u64,
    /// Record payload
    pub data: R,
    /// Opaque cursor identifying this event
    pub id: String,
    /// Event type
    pub event: String,
    /// Advisory reconnection delay
    pub retry: Duration,
    /// Human-readable UTC timestamp of the tick
    pub comment: String,
}

/// Format a tick deadline as an RFC 3339 UTC timestamp with millisecond precision.
pub fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| format!("{}ms", ms))
}

/// Server configuration options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Port to listen on (0 for auto-assign)
    pub port: u16,
    /// Host to bind to
    pub host: String,
    /// Interval between keep-alive comments on idle streams (0 disables them)
    pub keep_alive_secs: u64,
    /// Stream timing and naming
    pub stream: StreamOptions,
    /// Dataset location
    pub dataset: DatasetSource,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_BINDING_ADDRESS.to_string(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            stream: StreamOptions::default(),
            dataset: DatasetSource::Embedded,
        }
    }
}

impl ServerOptions {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = StreamOptions::default();
        assert_eq!(options.interval_ms, 4_000);
        assert_eq!(options.retry_ms, 10_000);
        assert_eq!(options.max_backfill, 1_000);
        assert_eq!(options.tag, "country");
        assert_eq!(options.validate(), Ok(()));
    }

    #[test]
    fn test_validate() {
        let zero = StreamOptions {
            interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(StreamConfigError::ZeroInterval));

        let empty = StreamOptions {
            tag: String::new(),
            ..Default::default()
        };
        assert_eq!(empty.validate(), Err(StreamConfigError::EmptyTag));

        let delimited = StreamOptions {
            tag: "north-america".into(),
            ..Default::default()
        };
        assert!(matches!(
            delimited.validate(),
            Err(StreamConfigError::DelimiterInTag { .. })
        ));

        let multiline = StreamOptions {
            tag: "country\nid: 1".into(),
            ..Default::default()
        };
        assert!(matches!(
            multiline.validate(),
            Err(StreamConfigError::ControlCharacterInTag(_))
        ));
    }

    #[test]
    fn test_tick_math() {
        let options = StreamOptions::default();
        assert_eq!(options.tick_at(0), 0);
        assert_eq!(options.tick_at(3_999), 0);
        assert_eq!(options.tick_at(4_000), 1);
        assert_eq!(options.deadline_ms(3), 12_000);
        assert_eq!(options.deadline_ms(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_timestamp(1_700_000_004_000), "2023-11-14T22:13:24.000Z");
        assert_eq!(format_timestamp(u64::MAX), format!("{}ms", u64::MAX));
    }

    #[test]
    fn test_stream_options_partial_deserialize() {
        let options: StreamOptions = serde_json::from_str(r#"{"interval_ms": 1000}"#).unwrap();
        assert_eq!(options.interval_ms, 1_000);
        assert_eq!(options.tag, "country");
    }
}
