//! Benchmark for envelope framing and payload compression.
//!
//! Run with: cargo bench --package demoscope_protocol --bench envelope_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use demoscope_protocol::{BlockCodec, Envelope, Lz4Codec, SnappyCodec, MAX_HEADER_SIZE};

fn build_stream(count: u32, payload_len: usize) -> Vec<u8> {
    let payload: Vec<u8> = (0..payload_len).map(|i| (i % 17) as u8).collect();
    let mut buffer = vec![0u8; payload_len + MAX_HEADER_SIZE];
    let mut stream = Vec::new();

    for tick in 0..count {
        let mut envelope = Envelope::new(tick, 7, &payload);
        let written = envelope.serialize(&mut buffer, None);
        stream.extend_from_slice(&buffer[..written]);
    }
    stream
}

fn benchmark_deserialize(c: &mut Criterion) {
    let count = 10_000;
    let stream = build_stream(count, 96);

    let mut group = c.benchmark_group("envelope");
    group.throughput(Throughput::Elements(u64::from(count)));

    group.bench_function("deserialize_stream", |b| {
        b.iter(|| {
            let mut cursor = 0;
            let mut bytes = 0usize;
            while cursor < stream.len() {
                let (envelope, consumed) = Envelope::deserialize(&stream[cursor..]).unwrap();
                bytes += envelope.size();
                cursor += consumed;
            }
            black_box(bytes)
        });
    });

    group.finish();
}

fn benchmark_uncompress(c: &mut Criterion) {
    let payload: Vec<u8> = (0..16_384).map(|i| (i / 64) as u8).collect();
    let mut scratch = vec![0u8; 102_400];

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    for (name, codec) in [("snappy", &SnappyCodec as &dyn BlockCodec), ("lz4", &Lz4Codec)] {
        let mut envelope = Envelope::new(0, 13, &payload);
        envelope.compress(codec);

        group.bench_function(format!("uncompress_{name}"), |b| {
            b.iter(|| {
                let mut packet = envelope.clone();
                black_box(packet.uncompress(codec, &mut scratch).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_deserialize, benchmark_uncompress);
criterion_main!(benches);
