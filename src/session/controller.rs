//! Capture session controller
//!
//! Drives one session through connect, subscribe and delivery, enforces the
//! duration budget, and guarantees the event log is closed on every exit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::{CaptureSession, SessionPhase};
use crate::error::Result;
use crate::event::classify;
use crate::feed::{channels_for, Delivery, FeedClient, MessageHandler};
use crate::metrics::RecorderMetrics;
use crate::parser::FeedMessage;

/// Final outcome of a capture run
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub symbol: String,
    pub outcome: SessionPhase,
    pub event_count: u64,
    pub messages_received: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl SessionReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.outcome != SessionPhase::Failed
    }
}

/// Per-message pipeline: budget check, decode, classify, append
pub struct MessagePipeline<W: Write = File> {
    session: Arc<CaptureSession<W>>,
    metrics: Arc<RecorderMetrics>,
    progress_interval: u64,
    messages_received: u64,
}

impl<W: Write> MessagePipeline<W> {
    pub fn new(
        session: Arc<CaptureSession<W>>,
        metrics: Arc<RecorderMetrics>,
        progress_interval: u64,
    ) -> Self {
        Self {
            session,
            metrics,
            progress_interval,
            messages_received: 0,
        }
    }

    /// Messages decoded and classified so far
    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    fn report_progress(&self, before: u64, after: u64) {
        if crossed_interval(before, after, self.progress_interval) {
            info!(
                symbol = %self.session.symbol(),
                events = after,
                elapsed_secs = self.session.elapsed().as_secs(),
                "Captured {} events",
                after
            );
        }
    }
}

/// True when the count moved past a multiple of `interval`; 0 disables
fn crossed_interval(before: u64, after: u64, interval: u64) -> bool {
    interval != 0 && after / interval > before / interval
}

impl<W: Write> MessageHandler for MessagePipeline<W> {
    fn on_message(&mut self, raw: &str) -> Result<Delivery> {
        if !self.session.is_running() {
            return Ok(Delivery::Stop);
        }

        // The message that crosses the budget is dropped unprocessed.
        if self.session.budget_exhausted() {
            if self.session.finish(SessionPhase::Complete) {
                info!(
                    events = self.session.event_count(),
                    "Recording complete, duration budget exhausted"
                );
            }
            return Ok(Delivery::Stop);
        }

        self.messages_received += 1;
        self.metrics.messages_received.inc();

        let message = FeedMessage::parse(raw).map_err(|e| {
            self.metrics.parse_failures.inc();
            e
        })?;

        let events = classify(&message);
        if events.is_empty() {
            trace!(event_type = ?message.event_type(), "Ignoring message");
            return Ok(Delivery::Continue);
        }

        match self.session.append_batch(&events)? {
            Some(total) => {
                self.metrics.record_batch(&events);
                self.report_progress(total - events.len() as u64, total);
                Ok(Delivery::Continue)
            }
            None => Ok(Delivery::Stop),
        }
    }
}

/// Requests cancellation of a running capture from another task
pub struct StopHandle<W: Write = File> {
    session: Arc<CaptureSession<W>>,
    token: CancellationToken,
}

impl<W: Write> Clone for StopHandle<W> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            token: self.token.clone(),
        }
    }
}

impl<W: Write> StopHandle<W> {
    /// Cancel the session; repeated calls are no-ops
    pub fn stop(&self) {
        if self.session.finish(SessionPhase::Cancelled) {
            info!(events = self.session.event_count(), "Capture cancelled");
        }
        self.token.cancel();
    }
}

/// Orchestrates a single capture session
pub struct SessionController<W: Write = File> {
    session: Arc<CaptureSession<W>>,
    metrics: Arc<RecorderMetrics>,
    endpoint: String,
    progress_interval: u64,
    stop: CancellationToken,
}

impl<W> SessionController<W>
where
    W: Write + Send + 'static,
{
    pub fn new(
        session: Arc<CaptureSession<W>>,
        metrics: Arc<RecorderMetrics>,
        endpoint: &str,
        progress_interval: u64,
    ) -> Self {
        Self {
            session,
            metrics,
            endpoint: endpoint.to_string(),
            progress_interval,
            stop: CancellationToken::new(),
        }
    }

    pub fn session(&self) -> &Arc<CaptureSession<W>> {
        &self.session
    }

    /// Handle for an external interrupt
    pub fn stop_handle(&self) -> StopHandle<W> {
        StopHandle {
            session: self.session.clone(),
            token: self.stop.clone(),
        }
    }

    /// Run the session to a terminal phase and report the outcome
    pub async fn run(self) -> SessionReport {
        let mut pipeline = MessagePipeline::new(
            self.session.clone(),
            self.metrics.clone(),
            self.progress_interval,
        );

        let outcome = self.capture(&mut pipeline).await;
        let mut failure = self.settle(outcome);

        if let Err(e) = self.session.close_sink() {
            error!(error = %e, "Failed to close event log");
            failure.get_or_insert_with(|| e.to_string());
        }

        let report = SessionReport {
            symbol: self.session.symbol().to_string(),
            outcome: self.session.phase(),
            event_count: self.session.event_count(),
            messages_received: pipeline.messages_received(),
            started_at: self.session.started_at(),
            elapsed: self.session.elapsed(),
            error: failure,
        };

        info!(
            symbol = %report.symbol,
            outcome = ?report.outcome,
            events = report.event_count,
            messages = report.messages_received,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Capture session ended"
        );

        report
    }

    /// Resolve the capture result into a terminal phase.
    ///
    /// An error that arrives after the session already ended (a stop racing
    /// a transport or parse failure) does not override that outcome.
    fn settle(&self, outcome: Result<()>) -> Option<String> {
        match outcome {
            Ok(()) => {
                // Delivery only ends cleanly after a stop; cover the rest.
                self.session.finish(SessionPhase::Complete);
                None
            }
            Err(e) if self.session.finish(SessionPhase::Failed) => {
                error!(error = %e, "Capture session failed");
                Some(e.to_string())
            }
            Err(e) => {
                warn!(
                    phase = ?self.session.phase(),
                    error = %e,
                    "Ignoring error after session ended"
                );
                None
            }
        }
    }

    async fn capture(&self, pipeline: &mut MessagePipeline<W>) -> Result<()> {
        if !self.session.begin_connecting() {
            warn!(phase = ?self.session.phase(), "Session is not idle, skipping connect");
            return Ok(());
        }

        let symbol = self.session.symbol().to_string();
        let mut client = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return Ok(()),
            client = FeedClient::connect(&self.endpoint, &symbol) => client?,
        };

        if let Err(e) = client.subscribe(&channels_for(&symbol)).await {
            client.close().await;
            return Err(e);
        }

        if !self.session.mark_running() {
            client.close().await;
            return Ok(());
        }

        info!(
            symbol = %symbol,
            duration_secs = self.session.duration_budget().as_secs(),
            "Recording"
        );

        let watchdog = self.spawn_watchdog(&client);
        let result = client.deliver(pipeline).await;
        watchdog.abort();
        client.close().await;

        result
    }

    /// Closes the feed on an external stop, or once the budget runs out
    /// while no message arrives to trigger the per-message check
    fn spawn_watchdog(&self, client: &FeedClient) -> tokio::task::JoinHandle<()> {
        let close = client.close_handle();
        let stop = self.stop.clone();
        let session = self.session.clone();
        // Budgets past the clock's range never expire; only a stop ends them.
        let deadline = tokio::time::Instant::now().checked_add(session.remaining());

        tokio::spawn(async move {
            let expiry = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = stop.cancelled() => {}
                _ = expiry => {
                    if session.finish(SessionPhase::Complete) {
                        info!(
                            events = session.event_count(),
                            "Recording complete, duration budget exhausted"
                        );
                    }
                }
            }
            close.close();
        })
    }
}
