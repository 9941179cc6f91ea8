//! Parser module for Binance WebSocket messages
//!
//! Decodes the combined-stream envelope and the trade and depth-update
//! payloads it carries. Prices and quantities stay exact decimals.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{RecorderError, Result};

/// Event-type tag of trade payloads
pub const TRADE_EVENT: &str = "trade";
/// Event-type tag of depth-update payloads
pub const DEPTH_UPDATE_EVENT: &str = "depthUpdate";

/// Binance depth update message
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdate {
    /// Event time (milliseconds)
    #[serde(rename = "E")]
    pub event_time: u64,

    /// Symbol
    #[serde(rename = "s", default)]
    pub symbol: String,

    /// First update ID in event
    #[serde(rename = "U", default)]
    pub first_update_id: u64,

    /// Final update ID in event
    #[serde(rename = "u", default)]
    pub final_update_id: u64,

    /// Bids to update
    #[serde(rename = "b", default, deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<PriceLevel>,

    /// Asks to update
    #[serde(rename = "a", default, deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<PriceLevel>,
}

/// Binance trade message
#[derive(Debug, Clone, Deserialize)]
pub struct Trade {
    /// Event time
    #[serde(rename = "E", default)]
    pub event_time: u64,

    /// Symbol
    #[serde(rename = "s", default)]
    pub symbol: String,

    /// Trade ID
    #[serde(rename = "t", default)]
    pub trade_id: u64,

    /// Price
    #[serde(rename = "p", deserialize_with = "deserialize_decimal")]
    pub price: Decimal,

    /// Quantity
    #[serde(rename = "q", deserialize_with = "deserialize_decimal")]
    pub quantity: Decimal,

    /// Trade time
    #[serde(rename = "T")]
    pub trade_time: u64,

    /// Is buyer maker
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// Price level (price, quantity pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// Decoded feed message
#[derive(Debug, Clone)]
pub enum FeedMessage {
    Trade(Trade),
    DepthUpdate(DepthUpdate),
    /// Subscription acks and event types the recorder does not capture.
    /// Carries the event-type tag when the payload had one.
    Other(Option<String>),
}

impl FeedMessage {
    /// Parse a raw WebSocket text frame.
    ///
    /// Combined streams wrap the payload as `{"stream": .., "data": {..}}`;
    /// single streams send the payload bare. Both are accepted. Frames that
    /// are not a JSON object, or a known payload with missing or mistyped
    /// fields, are a [`RecorderError::ParseError`].
    pub fn parse(raw: &str) -> Result<Self> {
        let envelope: Value = serde_json::from_str(raw)?;
        let Value::Object(mut fields) = envelope else {
            return Err(RecorderError::ParseError(
                "expected a JSON object envelope".to_string(),
            ));
        };

        match fields.remove("data") {
            Some(data) => Self::from_payload(&data),
            None => Self::from_payload(&Value::Object(fields)),
        }
    }

    /// Decode a payload object by its `e` tag
    pub fn from_payload(payload: &Value) -> Result<Self> {
        if !payload.is_object() {
            return Err(RecorderError::ParseError(format!(
                "expected a payload object, got {}",
                payload
            )));
        }

        match payload.get("e").and_then(Value::as_str) {
            Some(TRADE_EVENT) => Ok(FeedMessage::Trade(Trade::deserialize(payload)?)),
            Some(DEPTH_UPDATE_EVENT) => {
                Ok(FeedMessage::DepthUpdate(DepthUpdate::deserialize(payload)?))
            }
            tag => Ok(FeedMessage::Other(tag.map(str::to_string))),
        }
    }

    /// Event-type tag of the decoded payload, if any
    pub fn event_type(&self) -> Option<&str> {
        match self {
            FeedMessage::Trade(_) => Some(TRADE_EVENT),
            FeedMessage::DepthUpdate(_) => Some(DEPTH_UPDATE_EVENT),
            FeedMessage::Other(tag) => tag.as_deref(),
        }
    }
}

/// Custom deserializer for Decimal from string
fn deserialize_decimal<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Decimal::from_str(&s).map_err(serde::de::Error::custom)
}

/// Custom deserializer for price levels from array of string pairs
fn deserialize_price_levels<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<PriceLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<String>> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|pair| {
            if pair.len() != 2 {
                return Err(serde::de::Error::custom("Invalid price level format"));
            }
            Ok(PriceLevel {
                price: Decimal::from_str(&pair[0]).map_err(serde::de::Error::custom)?,
                quantity: Decimal::from_str(&pair[1]).map_err(serde::de::Error::custom)?,
            })
        })
        .collect()
}
