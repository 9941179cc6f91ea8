//! Feed module for the Binance market-event connection

mod client;

pub use client::{channels_for, stream_url, CloseHandle, Delivery, FeedClient, MessageHandler};

#[cfg(test)]
pub use client::MockMessageHandler;
