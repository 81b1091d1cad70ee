//! Timing a compressor on a set of inputs, with a byte-exact round-trip check.

use std::io::Write;
use std::time::{Duration, Instant};

use crate::engine::Decompressor;
use crate::error::ZstrongError;
use crate::graph::Compressor;
use crate::stream::Stream;

pub const CSV_HEADER: &str = "name,original_size,compressed_size,ratio,compress_ms,decompress_ms,compress_mbps,decompress_mbps";

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub name: String,
    pub original_size: usize,
    pub compressed_size: usize,
    pub compress_time: Duration,
    pub decompress_time: Duration,
}

impl BenchmarkResult {
    /// Original over compressed size. Zero when nothing was compressed.
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.compressed_size as f64
    }

    pub fn compress_mbps(&self) -> f64 {
        throughput(self.original_size, self.compress_time)
    }

    pub fn decompress_mbps(&self) -> f64 {
        throughput(self.original_size, self.decompress_time)
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{:.4},{:.3},{:.3},{:.2},{:.2}",
            self.name,
            self.original_size,
            self.compressed_size,
            self.ratio(),
            self.compress_time.as_secs_f64() * 1e3,
            self.decompress_time.as_secs_f64() * 1e3,
            self.compress_mbps(),
            self.decompress_mbps()
        )
    }
}

fn throughput(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    bytes as f64 / (1024.0 * 1024.0) / secs
}

/// Compresses and decompresses `inputs` once, failing if the round trip is not exact.
pub fn run_benchmark(
    name: &str,
    compressor: &Compressor,
    decompressor: &Decompressor,
    inputs: Vec<Stream>,
) -> Result<BenchmarkResult, ZstrongError> {
    let original_size = inputs.iter().map(Stream::byte_len).sum();

    let start = Instant::now();
    let compressed = compressor.compress(inputs.clone())?;
    let compress_time = start.elapsed();

    let start = Instant::now();
    let restored = decompressor.decompress(&compressed)?;
    let decompress_time = start.elapsed();

    if restored != inputs {
        return Err(ZstrongError::InternalError(format!(
            "benchmark '{}' did not round-trip",
            name
        )));
    }

    let result = BenchmarkResult {
        name: name.to_string(),
        original_size,
        compressed_size: compressed.len(),
        compress_time,
        decompress_time,
    };
    log_metric!(
        "event" = "benchmark",
        "name" = name,
        "ratio" = format!("{:.3}", result.ratio()),
        "compress_mbps" = format!("{:.1}", result.compress_mbps())
    );
    Ok(result)
}

pub fn write_csv<W: Write>(mut writer: W, results: &[BenchmarkResult]) -> Result<(), ZstrongError> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for result in results {
        writeln!(writer, "{}", result.to_csv_row())?;
    }
    Ok(())
}
