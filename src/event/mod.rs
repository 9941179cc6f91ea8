//! Normalized event module
//!
//! The uniform record schema every feed message is classified into.

mod normalizer;

pub use normalizer::classify;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;

use crate::parser::{PriceLevel, Trade};

/// Header row of the event log
pub const CSV_HEADER: &str = "timestamp,type,side,price,quantity";

/// Kind of a normalized event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Trade,
    Add,
    Cancel,
}

impl EventKind {
    /// Single-letter code used in the log
    pub fn code(self) -> &'static str {
        match self {
            EventKind::Trade => "T",
            EventKind::Add => "A",
            EventKind::Cancel => "C",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Side of the book an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn code(self) -> &'static str {
        match self {
            Side::Buy => "B",
            Side::Sell => "S",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single persisted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Exchange-assigned time in milliseconds
    pub timestamp: u64,
    pub kind: EventKind,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl NormalizedEvent {
    /// Trade event; the aggressor sold when the buyer was the maker
    pub fn from_trade(trade: &Trade) -> Self {
        Self {
            timestamp: trade.trade_time,
            kind: EventKind::Trade,
            side: if trade.is_buyer_maker {
                Side::Sell
            } else {
                Side::Buy
            },
            price: trade.price,
            quantity: trade.quantity,
        }
    }

    /// Add or cancel event for one depth delta; zero quantity means cancel
    pub fn from_depth_delta(timestamp: u64, side: Side, level: &PriceLevel) -> Self {
        let kind = if level.quantity.is_zero() {
            EventKind::Cancel
        } else {
            EventKind::Add
        };

        Self {
            timestamp,
            kind,
            side,
            price: level.price,
            quantity: level.quantity,
        }
    }

    /// Append this event as one CSV row, newline included
    pub fn write_csv_row(&self, out: &mut String) {
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            self.timestamp, self.kind, self.side, self.price, self.quantity
        );
    }

    pub fn to_csv_row(&self) -> String {
        let mut row = String::with_capacity(48);
        self.write_csv_row(&mut row);
        row.pop();
        row
    }
}
