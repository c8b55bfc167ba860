//! Criterion benchmarks for the envelope codec.
//!
//! Every message on a panel's channel goes through `classify_inbound`,
//! including unrelated traffic, so the foreign-traffic path matters as much as
//! the protocol path.
//!
//! Run with:
//! ```bash
//! cargo bench --package panel-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use panel_core::protocol::codec::classify_text;
use panel_core::{classify_inbound, encode_envelope, Envelope};
use serde_json::{json, Value};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_form_submit() -> Envelope {
    Envelope::new(
        "form:submit",
        json!({
            "formId": "contact",
            "action": "submit",
            "values": {"name": "Ada", "email": "ada@example.com", "age": 36},
            "timestamp": 1_700_000_000_000u64
        }),
    )
    .with_request_id("form-1700000000000-abcdef123")
}

fn make_foreign() -> Value {
    json!({"source": "react-devtools-bridge", "payload": {"event": "operations"}})
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let env = make_form_submit();
    c.bench_function("encode_envelope/form_submit", |b| {
        b.iter(|| encode_envelope(black_box(&env)).unwrap())
    });
}

fn bench_classify(c: &mut Criterion) {
    let ours = serde_json::to_value(make_form_submit()).unwrap();
    let theirs = make_foreign();
    let text = encode_envelope(&make_form_submit()).unwrap();

    let mut group = c.benchmark_group("classify");
    group.bench_function("protocol_value", |b| {
        b.iter(|| classify_inbound(black_box(&ours)))
    });
    group.bench_function("foreign_value", |b| {
        b.iter(|| classify_inbound(black_box(&theirs)))
    });
    group.bench_function("protocol_text", |b| {
        b.iter(|| classify_text(black_box(&text)))
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_classify);
criterion_main!(benches);
