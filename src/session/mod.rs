//! Capture session module
//!
//! One session per run. The running flag, lifecycle phase, event counter and
//! the event log all sit behind a single mutex, so a batch append and its
//! counter update are observed together by every other context.

mod controller;

pub use controller::{MessagePipeline, SessionController, SessionReport, StopHandle};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::Result;
use crate::event::NormalizedEvent;
use crate::sink::EventSink;

/// Lifecycle phase of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Connecting,
    Running,
    Complete,
    Failed,
    Cancelled,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionPhase::Complete | SessionPhase::Failed | SessionPhase::Cancelled
        )
    }
}

struct SessionState<W: Write> {
    phase: SessionPhase,
    running: bool,
    event_count: u64,
    sink: EventSink<W>,
}

/// State of one capture run
pub struct CaptureSession<W: Write = File> {
    symbol: String,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    duration_budget: Duration,
    state: Mutex<SessionState<W>>,
}

impl<W: Write> CaptureSession<W> {
    /// Start a session clock for `symbol`, writing into `sink`
    pub fn new(symbol: &str, duration_budget: Duration, sink: EventSink<W>) -> Self {
        Self {
            symbol: symbol.to_lowercase(),
            started_at: Instant::now(),
            started_wall: Utc::now(),
            duration_budget,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                running: false,
                event_count: 0,
                sink,
            }),
        }
    }

    // A panic while holding the lock leaves counters intact; keep going.
    fn lock(&self) -> MutexGuard<'_, SessionState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_wall
    }

    pub fn duration_budget(&self) -> Duration {
        self.duration_budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time left before the budget runs out
    pub fn remaining(&self) -> Duration {
        self.duration_budget.saturating_sub(self.elapsed())
    }

    pub fn budget_exhausted(&self) -> bool {
        self.elapsed() > self.duration_budget
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn event_count(&self) -> u64 {
        self.lock().event_count
    }

    /// Idle -> Connecting. False if the session already left Idle.
    pub fn begin_connecting(&self) -> bool {
        self.transition(SessionPhase::Idle, SessionPhase::Connecting)
    }

    /// Connecting -> Running; the session starts accepting batches
    pub fn mark_running(&self) -> bool {
        let mut state = self.lock();
        if state.phase != SessionPhase::Connecting {
            return false;
        }
        state.phase = SessionPhase::Running;
        state.running = true;
        info!(symbol = %self.symbol, "Capture session running");
        true
    }

    /// Move to a terminal phase and stop accepting batches.
    ///
    /// Only the first call wins; returns false once the session is already
    /// terminal.
    pub fn finish(&self, outcome: SessionPhase) -> bool {
        debug_assert!(outcome.is_terminal());
        let mut state = self.lock();
        if state.phase.is_terminal() {
            return false;
        }
        state.phase = outcome;
        state.running = false;
        debug!(outcome = ?outcome, events = state.event_count, "Capture session finished");
        true
    }

    fn transition(&self, from: SessionPhase, to: SessionPhase) -> bool {
        let mut state = self.lock();
        if state.phase != from {
            return false;
        }
        state.phase = to;
        true
    }

    /// Append one classified batch and bump the event counter under the
    /// session lock.
    ///
    /// Returns the new event count, or `None` when the session is no longer
    /// running and the batch was dropped.
    pub fn append_batch(&self, events: &[NormalizedEvent]) -> Result<Option<u64>> {
        let mut state = self.lock();
        if !state.running {
            return Ok(None);
        }

        let written = state.sink.append_batch(events)?;
        state.event_count += written as u64;
        Ok(Some(state.event_count))
    }

    /// Flush and close the event log; idempotent
    pub fn close_sink(&self) -> Result<()> {
        self.lock().sink.close()
    }

    /// Run `f` against the event log while holding the session lock
    pub fn with_sink<R>(&self, f: impl FnOnce(&EventSink<W>) -> R) -> R {
        f(&self.lock().sink)
    }
}
