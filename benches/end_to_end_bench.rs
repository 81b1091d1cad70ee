use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use zstrong::profiles;
use zstrong::{Compressor, Decompressor, Stream};

// --- Mock Data Generation ---

/// Long runs, the constant and zstd paths shine here.
fn generate_runs(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i / 100) as u8).collect()
}

/// Little-endian u32 counters, which the le-u32 profile should unpack.
fn generate_le_counters(size: usize) -> Vec<u8> {
    (0..(size / 4) as u32)
        .flat_map(|i| (50_000 + i * 3).to_le_bytes())
        .collect()
}

/// Repeating full-range pattern, LZ-friendly but incompressible per byte.
fn generate_pattern(size: usize) -> Vec<u8> {
    let pattern: Vec<u8> = (0..=255u8).collect();
    pattern.iter().copied().cycle().take(size).collect()
}

// --- Benchmark Suite ---

const BENCH_DATA_SIZE: usize = 131_072; // 128 KB

fn bench_e2e_flow(c: &mut Criterion) {
    let mut group = c.benchmark_group("End-to-End Graph Compression");
    group.throughput(Throughput::Bytes(BENCH_DATA_SIZE as u64));
    let decompressor = Decompressor::new();

    let cases = [
        ("runs", profiles::SERIAL, generate_runs(BENCH_DATA_SIZE)),
        ("le counters", profiles::LE_U32, generate_le_counters(BENCH_DATA_SIZE)),
        ("pattern", profiles::SERIAL, generate_pattern(BENCH_DATA_SIZE)),
    ];
    for (name, profile, data) in &cases {
        let compressor = profiles::build_profile(profile).unwrap();
        let compressed = compressor.compress_serial(data).unwrap();

        group.bench_function(format!("Compress {} ({})", name, profile), |b| {
            b.iter(|| black_box(compressor.compress_serial(black_box(data))))
        });
        group.bench_function(format!("Decompress {} ({})", name, profile), |b| {
            b.iter(|| black_box(decompressor.decompress(black_box(&compressed))))
        });
    }

    // The generic selector over numeric input measures trial compressions too.
    let values: Vec<u32> = (0..(BENCH_DATA_SIZE / 4) as u32).map(|i| i * 7 % 1000).collect();
    let generic = Compressor::new();
    group.bench_function("Compress numeric (generic selector)", |b| {
        b.iter(|| black_box(generic.compress(black_box(vec![Stream::numeric(&values)]))))
    });

    group.finish();
}

criterion_group!(benches, bench_e2e_flow);
criterion_main!(benches);
