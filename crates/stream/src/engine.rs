//! Clock-aligned stream engine.
//!
//! Tick `t` covers the wall-clock window `[t * interval, (t + 1) * interval)`
//! since the Unix epoch. A session emits one event per tick, in order and
//! without gaps, each one no earlier than the start of its window. Because ticks
//! are derived from the wall clock rather than from per-connection state, two
//! sessions started at the same moment emit the same sequence, and a client
//! that reconnects with the last ID it saw resumes right after it.
//!
//! A session only ever suspends while waiting for a tick deadline. The wait is
//! a tokio timer owned by the session, so dropping the session (a client
//! disconnect) or firing its [`CancelHandle`] ends it with no work left behind.

use std::{sync::Arc, time::Duration};

use futures::Stream;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    clock::{SharedClock, SystemClock},
    cursor::CursorCodec,
    dataset::Dataset,
    types::{StreamConfigError, StreamOptions, TickEvent, format_timestamp},
};

/// Compute the first tick of a session.
///
/// `current_tick` is the next tick boundary; `last_seen` is the tick decoded
/// from the client's cursor, if any. Resuming clients restart right after the
/// tick they last saw, but never more than `max_backfill` ticks in the past.
/// Cursors from the future are honored as-is.
pub fn resume_tick(current_tick: u64, last_seen: Option<u64>, max_backfill: u64) -> u64 {
    match last_seen {
        Some(seen) => seen
            .saturating_add(1)
            .max(current_tick.saturating_sub(max_backfill)),
        None => current_tick,
    }
}

struct EngineInner<R> {
    dataset: Dataset<R>,
    options: StreamOptions,
    clock: SharedClock,
    codec: CursorCodec,
}

/// Shared entry point for stream sessions. Cheap to clone.
pub struct StreamEngine<R> {
    inner: Arc<EngineInner<R>>,
}

impl<R> Clone for StreamEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> StreamEngine<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Create an engine driven by the system clock.
    pub fn new(dataset: Dataset<R>, options: StreamOptions) -> Result<Self, StreamConfigError> {
        Self::with_clock(dataset, options, Arc::new(SystemClock))
    }

    /// Create an engine driven by the given clock.
    pub fn with_clock(
        dataset: Dataset<R>,
        options: StreamOptions,
        clock: SharedClock,
    ) -> Result<Self, StreamConfigError> {
        options.validate()?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                dataset,
                options,
                clock,
                codec: CursorCodec::default(),
            }),
        })
    }

    pub fn dataset(&self) -> &Dataset<R> {
        &self.inner.dataset
    }

    pub fn options(&self) -> &StreamOptions {
        &self.inner.options
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// The next tick boundary after now. A fresh session never replays the tick in progress.
    pub fn current_tick(&self) -> u64 {
        self.inner.options.tick_at(self.now_ms()).saturating_add(1)
    }

    /// Decode a client cursor. Any failure is treated as "no cursor".
    pub fn decode_cursor(&self, last_event_id: &str) -> Option<u64> {
        match self
            .inner
            .codec
            .decode(last_event_id, &self.inner.options.tag)
        {
            Ok(tick) => Some(tick),
            Err(e) => {
                debug!(last_event_id = %last_event_id, error = %e, "Ignoring unusable cursor");
                None
            }
        }
    }

    pub fn encode_cursor(&self, tick: u64) -> String {
        self.inner.codec.encode(tick, &self.inner.options.tag)
    }

    /// First tick of a session opened now with the given `Last-Event-ID`.
    pub fn start_tick(&self, last_event_id: Option<&str>) -> u64 {
        let current_tick = self.current_tick();
        let last_seen = last_event_id.and_then(|id| self.decode_cursor(id));
        resume_tick(current_tick, last_seen, self.inner.options.max_backfill)
    }

    /// Open a session for one client connection.
    pub fn session(&self, last_event_id: Option<&str>) -> Session<R> {
        let tick = self.start_tick(last_event_id);
        debug!(
            start_tick = tick,
            resumed = last_event_id.is_some(),
            "Opening stream session"
        );
        Session::new(self.clone(), tick)
    }

    /// Build the event for a tick.
    pub fn event_for(&self, tick: u64) -> TickEvent<R> {
        let options = &self.inner.options;
        TickEvent {
            tick,
            data: self.inner.dataset.cyclic(tick).clone(),
            id: self.encode_cursor(tick),
            event: options.tag.clone(),
            retry: options.retry(),
            comment: format_timestamp(options.deadline_ms(tick)),
        }
    }

    #[cfg(test)]
    fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the deadline of `tick`, which is emitted next
    WaitForTick { tick: u64 },
    /// Terminal
    Cancelled,
}

/// Cancels a session from outside, waking it if it is waiting.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// One client's view of the stream.
pub struct Session<R> {
    engine: StreamEngine<R>,
    state: SessionState,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl<R> Session<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn new(engine: StreamEngine<R>, start_tick: u64) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            engine,
            state: SessionState::WaitForTick { tick: start_tick },
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The tick that will be emitted next, unless cancelled.
    pub fn next_tick(&self) -> Option<u64> {
        match self.state {
            SessionState::WaitForTick { tick } => Some(tick),
            SessionState::Cancelled => None,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    pub fn cancel(&mut self) {
        self.cancel_tx.send_replace(true);
        self.state = SessionState::Cancelled;
    }

    /// Wait for the next tick and emit its event.
    ///
    /// Returns `None` once the session is cancelled, or after tick `u64::MAX`.
    pub async fn next_event(&mut self) -> Option<TickEvent<R>> {
        let tick = self.next_tick()?;

        if !self.wait_until(self.engine.options().deadline_ms(tick)).await {
            debug!(tick, "Stream session cancelled");
            self.state = SessionState::Cancelled;
            return None;
        }

        let event = self.engine.event_for(tick);
        self.state = match tick.checked_add(1) {
            Some(tick) => SessionState::WaitForTick { tick },
            None => SessionState::Cancelled,
        };
        Some(event)
    }

    /// Sleep until the clock reaches `deadline_ms`. Returns false if cancelled first.
    async fn wait_until(&mut self, deadline_ms: u64) -> bool {
        loop {
            let cancelled = *self.cancel_rx.borrow_and_update();
            if cancelled {
                return false;
            }

            let now_ms = self.engine.now_ms();
            if now_ms >= deadline_ms {
                return true;
            }

            // Re-checked after waking: timers may fire slightly early relative to the clock
            let remaining = Duration::from_millis(deadline_ms - now_ms);
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                changed = self.cancel_rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Adapt the session into a stream of events, ending on cancellation.
    pub fn into_stream(mut self) -> impl Stream<Item = TickEvent<R>> + Send {
        async_stream::stream! {
            while let Some(event) = self.next_event().await {
                yield event;
            }
        }
    }
}

impl<R> Drop for Session<R> {
    fn drop(&mut self) {
        if let SessionState::WaitForTick { tick } = self.state {
            debug!(next_tick = tick, "Stream session closed");
        }
    }
}
