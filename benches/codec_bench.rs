use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use zstrong::codecs::builtin::ids;
use zstrong::{CodecId, CodecParams, CodecRegistry, GlobalParams, LocalParams, Stream};

// --- Data generation ---

/// Slowly increasing counters, the shape delta and bitpack are built for.
fn generate_counters(count: usize) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut value = 1_000_000u32;
    (0..count)
        .map(|_| {
            value = value.wrapping_add(rng.random_range(0..16));
            value
        })
        .collect()
}

/// Text-like bytes drawn from a small skewed alphabet.
fn generate_skewed_bytes(size: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(11);
    let alphabet = b"eeeeeeettttaaoinshr ";
    (0..size)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())])
        .collect()
}

// --- Benchmark Suite ---

const BENCH_ELEMENTS: usize = 16_384; // 64 KB of u32

fn bench_codecs(c: &mut Criterion) {
    let registry = CodecRegistry::with_builtins();
    let global = GlobalParams::default();
    let local = LocalParams::new();
    let params = CodecParams::new(&local, &global);

    let counters = Stream::numeric(&generate_counters(BENCH_ELEMENTS));
    let text = Stream::serial(generate_skewed_bytes(BENCH_ELEMENTS * 4));

    let cases: [(&str, CodecId, &Stream); 5] = [
        ("delta_int", ids::DELTA_INT, &counters),
        ("bitpack_int", ids::BITPACK_INT, &counters),
        ("transpose", ids::TRANSPOSE, &counters),
        ("zstd", ids::ZSTD, &text),
        ("entropy", ids::ENTROPY, &text),
    ];

    let mut group = c.benchmark_group("Built-in Codecs");
    group.throughput(Throughput::Bytes((BENCH_ELEMENTS * 4) as u64));

    for (name, id, input) in cases {
        let Some(codec) = registry.get(id) else {
            continue;
        };
        let (mut fixed, header) = codec.encode(vec![input.clone()], &params).unwrap().seal().unwrap();
        let nb_fixed = codec.descriptor().fixed_output_types.len();
        let variable = fixed.split_off(nb_fixed.min(fixed.len()));

        group.bench_function(format!("Encode {}", name), |b| {
            b.iter(|| black_box(codec.encode(black_box(vec![input.clone()]), &params)))
        });
        group.bench_function(format!("Decode {}", name), |b| {
            b.iter(|| {
                black_box(codec.decode(
                    black_box(fixed.clone()),
                    black_box(variable.clone()),
                    &header,
                ))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codecs);
criterion_main!(benches);
