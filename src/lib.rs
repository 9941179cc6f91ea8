//! L3 Recorder - Market Event Capture Library
//!
//! This crate connects to Binance WebSocket streams for one symbol,
//! classifies trades and depth deltas into a uniform event schema, and
//! appends them to a CSV event log for a fixed capture duration.

use std::sync::Arc;

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod health;
pub mod metrics;
pub mod parser;
pub mod session;
pub mod sink;

pub use config::{Config, LogFormat};
pub use error::{RecorderError, Result};
pub use event::{classify, EventKind, NormalizedEvent, Side};
pub use feed::{CloseHandle, Delivery, FeedClient, MessageHandler};
pub use metrics::RecorderMetrics;
pub use parser::{DepthUpdate, FeedMessage, PriceLevel, Trade};
pub use session::{
    CaptureSession, MessagePipeline, SessionController, SessionPhase, SessionReport, StopHandle,
};
pub use sink::EventSink;

/// Application state shared with the health server
pub struct AppState {
    pub session: Arc<CaptureSession>,
    pub metrics: Arc<RecorderMetrics>,
    pub config: Arc<Config>,
}
