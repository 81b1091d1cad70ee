//! The single source of truth for compressor-wide configuration.
//!
//! `GlobalParams` travels with a `Compressor`, is written (in part) into every
//! container it produces and is serialized with the compressor descriptor.
//! `TrainerConfig` drives the offline trainer. Both are plain serde structs so
//! they can be loaded from JSON documents or built in code.

use serde::{Deserialize, Serialize};

use crate::error::ZstrongError;

//==================================================================================
// 0. Format Version Constants
//==================================================================================

/// Oldest container format version this build can still read and write.
pub const MIN_FORMAT_VERSION: u32 = 1;
/// Newest container format version this build understands.
pub const MAX_FORMAT_VERSION: u32 = 3;

//==================================================================================
// I. Core Configuration Enums & Structs
//==================================================================================

/// Defines the trade-off between compression speed and final size for the
/// backend codecs (zstd) when no explicit level is set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionProfile {
    /// Prioritizes speed over size.
    Fast,

    /// A balance between speed and size. This is the recommended default.
    #[default]
    Balanced,

    /// Prioritizes the smallest possible output at the cost of CPU time.
    HighCompression,
}

impl CompressionProfile {
    /// The zstd level this profile maps to.
    pub fn zstd_level(self) -> i32 {
        match self {
            CompressionProfile::Fast => 1,
            CompressionProfile::Balanced => 3,
            CompressionProfile::HighCompression => 19,
        }
    }
}

/// Parameters that apply to a whole compression, as opposed to a single node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalParams {
    /// Container format version produced by the encoder.
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    /// Explicit backend level. Overrides `profile` when set.
    #[serde(default)]
    pub compression_level: Option<i32>,

    #[serde(default)]
    pub profile: CompressionProfile,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            format_version: default_format_version(),
            compression_level: None,
            profile: CompressionProfile::default(),
        }
    }
}

impl GlobalParams {
    /// The effective zstd level for backend codecs without a local override.
    pub fn zstd_level(&self) -> i32 {
        self.compression_level
            .unwrap_or_else(|| self.profile.zstd_level())
    }

    /// Rejects format versions outside the supported window.
    pub fn validate(&self) -> Result<(), ZstrongError> {
        if !(MIN_FORMAT_VERSION..=MAX_FORMAT_VERSION).contains(&self.format_version) {
            return Err(ZstrongError::UnsupportedVersion {
                version: self.format_version,
                min: MIN_FORMAT_VERSION,
                max: MAX_FORMAT_VERSION,
            });
        }
        Ok(())
    }
}

/// Provides a sensible default for `format_version` for serde.
fn default_format_version() -> u32 {
    MAX_FORMAT_VERSION
}

//==================================================================================
// II. Trainer Configuration
//==================================================================================

/// The search strategy used by the offline trainer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TrainStrategy {
    /// Fixes one decision point at a time, keeping the best choice for each.
    #[default]
    Greedy,
    /// Evaluates every combination of choices over the whole corpus.
    FullSplit,
    /// Starts from per-sample optima and merges clusters of samples.
    BottomUp,
    /// Keeps the size/speed frontier and picks from it by `time_weight`.
    Pareto,
}

impl TrainStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            TrainStrategy::Greedy => "greedy",
            TrainStrategy::FullSplit => "full-split",
            TrainStrategy::BottomUp => "bottom-up",
            TrainStrategy::Pareto => "pareto",
        }
    }
}

impl std::str::FromStr for TrainStrategy {
    type Err = ZstrongError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(TrainStrategy::Greedy),
            "full-split" | "full_split" => Ok(TrainStrategy::FullSplit),
            "bottom-up" | "bottom_up" => Ok(TrainStrategy::BottomUp),
            "pareto" => Ok(TrainStrategy::Pareto),
            other => Err(ZstrongError::InvalidParameter(format!(
                "unknown trainer '{}', expected one of: greedy, full-split, bottom-up, pareto",
                other
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TrainerConfig {
    #[serde(default)]
    pub strategy: TrainStrategy,

    /// Upper bound on the number of exhaustive combinations a strategy may evaluate.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Bytes charged per microsecond of compression time when ranking candidates.
    /// Zero ranks purely by size.
    #[serde(default)]
    pub time_weight: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            strategy: TrainStrategy::default(),
            max_candidates: default_max_candidates(),
            time_weight: 0.0,
        }
    }
}

fn default_max_candidates() -> usize {
    4096
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_params_defaults_from_empty_json() {
        let params: GlobalParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, GlobalParams::default());
        assert_eq!(params.format_version, MAX_FORMAT_VERSION);
        assert_eq!(params.zstd_level(), 3);
    }

    #[test]
    fn test_explicit_level_overrides_profile() {
        let params: GlobalParams =
            serde_json::from_str(r#"{"profile":"high_compression","compression_level":7}"#)
                .unwrap();
        assert_eq!(params.zstd_level(), 7);
    }

    #[test]
    fn test_validate_rejects_future_version() {
        let params = GlobalParams {
            format_version: MAX_FORMAT_VERSION + 1,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ZstrongError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_train_strategy_parsing() {
        assert_eq!("bottom-up".parse::<TrainStrategy>().unwrap(), TrainStrategy::BottomUp);
        assert_eq!("full-split".parse::<TrainStrategy>().unwrap(), TrainStrategy::FullSplit);
        assert!("simulated-annealing".parse::<TrainStrategy>().is_err());
    }
}
