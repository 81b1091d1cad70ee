//! zstrong CLI
//!
//! Compresses, decompresses, trains and benchmarks files with the profiles in
//! `zstrong::profiles` or with a saved compressor.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;

use zstrong::benchmark::{run_benchmark, write_csv};
use zstrong::profiles;
use zstrong::{peek_info, Compressor, Decompressor, Stream, TrainStrategy, Trainer, TrainerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Graph-based typed compression", long_about = None)]
struct Cli {
    /// Log engine decisions (honors RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

/// Which compressor to use: a named profile or a saved descriptor/document.
#[derive(Args, Debug)]
struct CompressorArgs {
    /// Named profile (store, serial, le-u16, le-u32, le-u64, numeric)
    #[arg(long, conflicts_with = "compressor")]
    profile: Option<String>,

    /// Path to a trained compressor or a graph document
    #[arg(long)]
    compressor: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a file into a container
    Compress {
        input: PathBuf,
        #[command(flatten)]
        using: CompressorArgs,
        /// Backend compression level
        #[arg(long)]
        level: Option<i32>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Restore the original file from a container
    Decompress {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Fix the decision points of a profile on a directory of sample files
    Train {
        #[arg(long, default_value = profiles::NUMERIC)]
        profile: String,
        /// Directory holding the training samples, one file per sample
        dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Search strategy: greedy, full-split, bottom-up or pareto
        #[arg(short = 't', long = "trainer", default_value = "greedy")]
        trainer: String,
        #[arg(long)]
        max_candidates: Option<usize>,
        /// Bytes charged per microsecond of compression time
        #[arg(long, default_value_t = 0.0)]
        time_weight: f64,
    },
    /// Measure ratio and speed on a file
    Benchmark {
        input: PathBuf,
        #[command(flatten)]
        using: CompressorArgs,
        #[arg(long)]
        output_csv: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        zstrong::enable_verbose_logging();
    }

    match cli.cmd {
        Command::Compress {
            input,
            using,
            level,
            output,
        } => {
            let mut compressor = resolve_compressor(&using)?;
            if let Some(level) = level {
                compressor.set_compression_level(level);
            }
            let data = read(&input)?;
            let compressed = compressor
                .compress_serial(&data)
                .with_context(|| format!("failed to compress {}", input.display()))?;
            write(&output, &compressed)?;
            let info = peek_info(&compressed)?;
            println!(
                "{} {} -> {} ({} bytes -> {} bytes, {} transform(s), format v{})",
                "compressed".green().bold(),
                input.display(),
                output.display(),
                data.len(),
                compressed.len(),
                info.nb_transforms,
                info.format_version
            );
        }
        Command::Decompress { input, output } => {
            let compressed = read(&input)?;
            let data = Decompressor::new()
                .decompress_serial(&compressed)
                .with_context(|| format!("failed to decompress {}", input.display()))?;
            write(&output, &data)?;
            println!(
                "{} {} -> {} ({} bytes)",
                "decompressed".green().bold(),
                input.display(),
                output.display(),
                data.len()
            );
        }
        Command::Train {
            profile,
            dir,
            output,
            trainer,
            max_candidates,
            time_weight,
        } => {
            let strategy: TrainStrategy = trainer.parse()?;
            let mut config = TrainerConfig {
                strategy,
                time_weight,
                ..Default::default()
            };
            if let Some(max) = max_candidates {
                config.max_candidates = max;
            }
            let compressor = profiles::build_profile(&profile)?;
            let corpus = load_corpus(&dir)?;
            let result = Trainer::new(config)
                .train(&compressor, &corpus)
                .context("training failed")?;
            write(&output, &result.compressor.serialize()?)?;
            println!(
                "{} {} decision point(s) on {} sample(s): {} bytes total, {} combination(s) measured",
                "trained".green().bold(),
                result.decision_points.len(),
                corpus.len(),
                result.best.total_size,
                result.evaluated
            );
            for (point, choice) in result.decision_points.iter().zip(&result.best.choices) {
                println!("  {} {} -> successor {}", point.selector.cyan(), point.graph, choice);
            }
        }
        Command::Benchmark {
            input,
            using,
            output_csv,
        } => {
            let compressor = resolve_compressor(&using)?;
            let data = read(&input)?;
            let name = using
                .profile
                .clone()
                .or_else(|| using.compressor.as_ref().map(|p| p.display().to_string()))
                .unwrap_or_else(|| profiles::SERIAL.to_string());
            let result = run_benchmark(&name, &compressor, &Decompressor::new(), vec![Stream::serial(data)])?;
            println!(
                "{} {}: ratio {:.3}, compress {:.1} MiB/s, decompress {:.1} MiB/s",
                "benchmark".green().bold(),
                name,
                result.ratio(),
                result.compress_mbps(),
                result.decompress_mbps()
            );
            if let Some(path) = output_csv {
                let file = fs::File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
                write_csv(file, &[result])?;
            }
        }
    }
    Ok(())
}

fn resolve_compressor(args: &CompressorArgs) -> Result<Compressor> {
    if let Some(path) = &args.compressor {
        let bytes = read(path)?;
        return profiles::load_compressor(&bytes).with_context(|| format!("cannot load compressor {}", path.display()));
    }
    let profile = args.profile.as_deref().unwrap_or(profiles::SERIAL);
    Ok(profiles::build_profile(profile)?)
}

/// Every regular file directly under `dir`, in name order, as one serial sample each.
fn load_corpus(dir: &Path) -> Result<Vec<Vec<Stream>>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("cannot list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    if paths.is_empty() {
        bail!("no sample files found in {}", dir.display());
    }
    paths
        .iter()
        .map(|path| Ok(vec![Stream::serial(read(path)?)]))
        .collect()
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("cannot read {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("cannot write {}", path.display()))
}
