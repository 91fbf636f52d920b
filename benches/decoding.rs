use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mailpart::config::DecodeConfig;
use mailpart::decode::codec;

fn bench_decode_fixtures(c: &mut Criterion) {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures");
    let related = std::fs::read(fixtures.join("related_inline.eml")).unwrap();
    let forwarded = std::fs::read(fixtures.join("forwarded.eml")).unwrap();
    let config = DecodeConfig::default();

    c.bench_function("decode_related_inline", |b| {
        b.iter(|| mailpart::decode_raw("1", &related, &config).unwrap())
    });
    c.bench_function("decode_forwarded", |b| {
        b.iter(|| mailpart::decode_raw("1", &forwarded, &config).unwrap())
    });
}

fn bench_base64(c: &mut Criterion) {
    // ~1 MiB of line-wrapped base64, as attachments arrive
    let payload: Vec<u8> = (0..786_432u32).map(|i| (i % 251) as u8).collect();
    let mut encoded = Vec::new();
    for chunk in base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &payload)
        .as_bytes()
        .chunks(76)
    {
        encoded.extend_from_slice(chunk);
        encoded.extend_from_slice(b"\r\n");
    }

    c.bench_function("decode_base64_1mib", |b| {
        b.iter(|| codec::decode_base64(&encoded))
    });
}

criterion_group!(benches, bench_decode_fixtures, bench_base64);
criterion_main!(benches);
