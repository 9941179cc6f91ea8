//! Classification of decoded feed messages into normalized events

use super::{NormalizedEvent, Side};
use crate::parser::{DepthUpdate, FeedMessage};

/// Classify one feed message.
///
/// A trade yields exactly one event. A depth update yields one event per
/// price level, all bid levels first and then all ask levels, each list in
/// its original order. Anything else yields nothing.
pub fn classify(message: &FeedMessage) -> Vec<NormalizedEvent> {
    match message {
        FeedMessage::Trade(trade) => vec![NormalizedEvent::from_trade(trade)],
        FeedMessage::DepthUpdate(update) => classify_depth(update),
        FeedMessage::Other(_) => Vec::new(),
    }
}

fn classify_depth(update: &DepthUpdate) -> Vec<NormalizedEvent> {
    let bids = update
        .bids
        .iter()
        .map(|level| NormalizedEvent::from_depth_delta(update.event_time, Side::Buy, level));
    let asks = update
        .asks
        .iter()
        .map(|level| NormalizedEvent::from_depth_delta(update.event_time, Side::Sell, level));

    bids.chain(asks).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::parser::{PriceLevel, Trade};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn trade(is_buyer_maker: bool) -> FeedMessage {
        FeedMessage::Trade(Trade {
            event_time: 1999,
            symbol: "BTCUSDT".to_string(),
            trade_id: 1,
            price: dec!(101),
            quantity: dec!(2),
            trade_time: 2000,
            is_buyer_maker,
        })
    }

    fn depth(
        event_time: u64,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
    ) -> FeedMessage {
        let levels = |pairs: &[(Decimal, Decimal)]| {
            pairs
                .iter()
                .map(|(p, q)| PriceLevel::new(*p, *q))
                .collect::<Vec<_>>()
        };
        FeedMessage::DepthUpdate(DepthUpdate {
            event_time,
            symbol: "BTCUSDT".to_string(),
            first_update_id: 1,
            final_update_id: 2,
            bids: levels(bids),
            asks: levels(asks),
        })
    }

    fn rows(events: &[NormalizedEvent]) -> Vec<String> {
        events.iter().map(NormalizedEvent::to_csv_row).collect()
    }

    #[test]
    fn test_cancel_from_zero_bid() {
        let events = classify(&depth(1000, &[(dec!(100.5), dec!(0))], &[]));
        assert_eq!(rows(&events), vec!["1000,C,B,100.5,0"]);
    }

    #[test]
    fn test_trade_side_follows_maker_flag() {
        assert_eq!(rows(&classify(&trade(true))), vec!["2000,T,S,101,2"]);
        assert_eq!(rows(&classify(&trade(false))), vec!["2000,T,B,101,2"]);
    }

    #[test]
    fn test_bids_precede_asks() {
        let events = classify(&depth(3000, &[(dec!(99), dec!(3))], &[(dec!(102), dec!(1))]));
        assert_eq!(rows(&events), vec!["3000,A,B,99,3", "3000,A,S,102,1"]);
    }

    #[test]
    fn test_pair_order_preserved_within_each_side() {
        let events = classify(&depth(
            5,
            &[(dec!(10), dec!(1)), (dec!(9), dec!(0)), (dec!(8), dec!(2))],
            &[(dec!(12), dec!(0)), (dec!(11), dec!(4))],
        ));

        let summary: Vec<(Side, Decimal, EventKind)> =
            events.iter().map(|e| (e.side, e.price, e.kind)).collect();
        assert_eq!(
            summary,
            vec![
                (Side::Buy, dec!(10), EventKind::Add),
                (Side::Buy, dec!(9), EventKind::Cancel),
                (Side::Buy, dec!(8), EventKind::Add),
                (Side::Sell, dec!(12), EventKind::Cancel),
                (Side::Sell, dec!(11), EventKind::Add),
            ]
        );
        assert!(events.iter().all(|e| e.timestamp == 5));
    }

    #[test]
    fn test_cancel_iff_zero_quantity() {
        let quantities = [dec!(0), dec!(0.000), dec!(0.001), dec!(7), dec!(0.00000000)];
        let pairs: Vec<(Decimal, Decimal)> = quantities.iter().map(|q| (dec!(1), *q)).collect();
        for event in classify(&depth(1, &pairs, &pairs)) {
            assert_eq!(event.quantity.is_zero(), event.kind == EventKind::Cancel);
        }
    }

    #[test]
    fn test_empty_depth_and_other_yield_nothing() {
        assert!(classify(&depth(1, &[], &[])).is_empty());
        assert!(classify(&FeedMessage::Other(Some("kline".to_string()))).is_empty());
        assert!(classify(&FeedMessage::Other(None)).is_empty());
    }
}
