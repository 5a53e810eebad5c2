//! Criterion benchmarks for the NBE codec and the legacy RSA transform.
//!
//! The monitors poll several categories every few seconds, so decoding a
//! full operating-data response should stay far below a millisecond.  The
//! RSA transform only runs for writes.
//!
//! Run with:
//! ```bash
//! cargo bench --package nbe-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nbe_core::protocol::codec::{decode_response, encode_request, encode_response};
use nbe_core::{
    AppId, ControllerId, Function, Payload, PrivateKey, Request, Response, RoundedFloat, Value,
};

fn make_operating_response() -> Response {
    let mut payload = Payload::new();
    for (key, tenths) in [
        ("boiler_temp", 625),
        ("dhw_temp_sensor", 485),
        ("smoke_temp", 1253),
        ("oxygen", 125),
        ("power_kw", 152),
        ("power_pct", 750),
        ("photo_level", 880),
    ] {
        payload.insert(key.into(), Value::Float(RoundedFloat::from_tenths(tenths)));
    }
    payload.insert("state".into(), Value::Int(5));
    Response {
        app_id: AppId::new("nbe-bridge").unwrap(),
        controller_id: ControllerId::new("ABC123").unwrap(),
        function: Function::GetOperatingData,
        seq_no: 17,
        status: 0,
        payload,
    }
}

fn make_request(function: Function, payload: &str) -> Request {
    Request::new(
        AppId::new("nbe-bridge").unwrap(),
        ControllerId::new("ABC123").unwrap(),
        function,
        17,
        "1234",
        payload,
    )
}

fn bench_response(c: &mut Criterion) {
    let response = make_operating_response();
    let bytes = encode_response(&response).unwrap();

    c.bench_function("encode_response/operating", |b| {
        b.iter(|| encode_response(black_box(&response)).unwrap())
    });
    c.bench_function("decode_response/operating", |b| {
        b.iter(|| decode_response(black_box(&bytes)).unwrap())
    });
}

fn bench_request(c: &mut Criterion) {
    let key = PrivateKey::generate(2048).unwrap();
    let read = make_request(Function::GetSetup, "boiler.*");
    let write = make_request(Function::SetSetup, "boiler.temp=75");

    c.bench_function("encode_request/plain", |b| {
        b.iter(|| encode_request(black_box(&read), None).unwrap())
    });
    c.bench_function("encode_request/encrypted_2048", |b| {
        b.iter(|| encode_request(black_box(&write), Some(key.public_key())).unwrap())
    });
}

criterion_group!(benches, bench_response, bench_request);
criterion_main!(benches);
