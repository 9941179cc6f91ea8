//! Benchmarks for decode, classification and batch append

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use l3_recorder::{classify, EventSink, FeedMessage};
use std::io;

fn depth_message(levels: usize) -> String {
    let side = |base: usize| {
        (0..levels)
            .map(|i| format!(r#"["{}.50","{}.125"]"#, base + i, i % 3))
            .collect::<Vec<_>>()
            .join(",")
    };

    format!(
        r#"{{"stream":"btcusdt@depth@100ms","data":{{"e":"depthUpdate","E":1672531200000,"s":"BTCUSDT","U":1,"u":2,"b":[{}],"a":[{}]}}}}"#,
        side(50000),
        side(50100)
    )
}

const TRADE: &str = r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1672531200000,"s":"BTCUSDT","t":12345,"p":"50000.50","q":"0.5","T":1672531200000,"m":false}}"#;

fn benchmark_parse_and_classify(c: &mut Criterion) {
    let depth = depth_message(20);

    c.bench_function("parse_classify_trade", |b| {
        b.iter(|| {
            let message = FeedMessage::parse(black_box(TRADE)).unwrap();
            black_box(classify(&message));
        })
    });

    c.bench_function("parse_classify_depth_20_levels", |b| {
        b.iter(|| {
            let message = FeedMessage::parse(black_box(&depth)).unwrap();
            black_box(classify(&message));
        })
    });
}

fn benchmark_append_batch(c: &mut Criterion) {
    let message = FeedMessage::parse(&depth_message(20)).unwrap();
    let events = classify(&message);
    let mut sink = EventSink::new(io::sink()).unwrap();

    c.bench_function("append_batch_40_events", |b| {
        b.iter(|| {
            sink.append_batch(black_box(&events)).unwrap();
        })
    });
}

criterion_group!(benches, benchmark_parse_and_classify, benchmark_append_batch);
criterion_main!(benches);
