/// Name of the application, used as the API document title
pub const APPLICATION_NAME: &str = "SSE API";

/// Default binding address for the HTTP server
pub const DEFAULT_BINDING_ADDRESS: &str = "127.0.0.1";

/// Default port for the HTTP server
pub const DEFAULT_PORT: u16 = 8080;

/// Default period (in milliseconds) between subsequent events
pub const DEFAULT_INTERVAL_MS: u64 = 4_000;

/// Default reconnection time (in milliseconds) advertised in the `retry` field
pub const DEFAULT_RETRY_MS: u64 = 10_000;

/// Default maximum number of events re-emitted when resuming with `Last-Event-ID`
pub const DEFAULT_MAX_BACKFILL: u64 = 1_000;

/// Default stream tag, used both as the SSE `event` field and the cursor namespace
pub const DEFAULT_STREAM_TAG: &str = "country";

/// Default delimiter between the tag and the tick inside a cursor
pub const DEFAULT_CURSOR_DELIMITER: char = '-';

/// Default interval (in seconds) between keep-alive comments on idle streams
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

/// Name of the optional dotenv file loaded at startup
pub const DOTENV_FILE_NAME: &str = ".env";
