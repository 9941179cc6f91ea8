//! Prometheus counters for the capture pipeline
//!
//! Kept in an owned registry so several sessions (or tests) never collide.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{RecorderError, Result};
use crate::event::{EventKind, NormalizedEvent};

pub struct RecorderMetrics {
    registry: Registry,
    pub messages_received: IntCounter,
    pub events_written: IntCounterVec,
    pub batches_written: IntCounter,
    pub parse_failures: IntCounter,
}

impl RecorderMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let messages_received = IntCounter::new(
            "recorder_messages_received_total",
            "Feed messages decoded by the recorder",
        )?;
        let events_written = IntCounterVec::new(
            Opts::new(
                "recorder_events_written_total",
                "Normalized events appended to the event log",
            ),
            &["type"],
        )?;
        let batches_written = IntCounter::new(
            "recorder_batches_written_total",
            "Batches appended to the event log",
        )?;
        let parse_failures = IntCounter::new(
            "recorder_parse_failures_total",
            "Feed messages that failed to decode",
        )?;

        registry.register(Box::new(messages_received.clone()))?;
        registry.register(Box::new(events_written.clone()))?;
        registry.register(Box::new(batches_written.clone()))?;
        registry.register(Box::new(parse_failures.clone()))?;

        Ok(Self {
            registry,
            messages_received,
            events_written,
            batches_written,
            parse_failures,
        })
    }

    /// Count one appended batch and its events by kind
    pub fn record_batch(&self, events: &[NormalizedEvent]) {
        self.batches_written.inc();
        for event in events {
            self.events_written
                .with_label_values(&[event.kind.code()])
                .inc();
        }
    }

    /// Events written across all kinds
    pub fn events_written_total(&self) -> u64 {
        [EventKind::Trade, EventKind::Add, EventKind::Cancel]
            .iter()
            .map(|kind| self.events_written.with_label_values(&[kind.code()]).get())
            .sum()
    }

    /// Render the registry in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| RecorderError::MetricsError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Side;
    use rust_decimal_macros::dec;

    fn event(kind: EventKind) -> NormalizedEvent {
        NormalizedEvent {
            timestamp: 1,
            kind,
            side: Side::Buy,
            price: dec!(1),
            quantity: dec!(1),
        }
    }

    #[test]
    fn test_record_batch_counts_by_kind() {
        let metrics = RecorderMetrics::new().unwrap();
        metrics.record_batch(&[
            event(EventKind::Add),
            event(EventKind::Cancel),
            event(EventKind::Add),
        ]);
        metrics.record_batch(&[event(EventKind::Trade)]);

        assert_eq!(metrics.batches_written.get(), 2);
        assert_eq!(metrics.events_written.with_label_values(&["A"]).get(), 2);
        assert_eq!(metrics.events_written_total(), 4);
    }

    #[test]
    fn test_encode_contains_counters() {
        let metrics = RecorderMetrics::new().unwrap();
        metrics.messages_received.inc();
        metrics.record_batch(&[event(EventKind::Trade)]);

        let text = metrics.encode().unwrap();
        assert!(text.contains("recorder_messages_received_total 1"));
        assert!(text.contains("recorder_events_written_total{type=\"T\"} 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = RecorderMetrics::new().unwrap();
        let second = RecorderMetrics::new().unwrap();
        first.parse_failures.inc();
        assert_eq!(second.parse_failures.get(), 0);
    }
}
