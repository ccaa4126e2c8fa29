use crate::arith::RoundingMode;
use crate::mutator::DEFAULT_MAX_DISTANCE;
use crate::probability::{DEFAULT_PRODUCT_LIMIT, SuccessEstimator};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ArithSettings {
    #[serde(default)]
    pub rounding: RoundingMode,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ProbabilitySettings {
    #[serde(default = "default_product_limit")]
    pub product_limit: u32,
}

fn default_product_limit() -> u32 {
    DEFAULT_PRODUCT_LIMIT
}

impl Default for ProbabilitySettings {
    fn default() -> Self {
        Self {
            product_limit: default_product_limit(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct MutationSettings {
    #[serde(default = "default_max_distance")]
    pub max_distance: u32,
    pub seed: Option<u64>,
}

pub fn default_max_distance() -> u32 {
    DEFAULT_MAX_DISTANCE
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
            seed: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzMathConfig {
    #[serde(default)]
    pub arith: ArithSettings,
    #[serde(default)]
    pub probability: ProbabilitySettings,
    #[serde(default)]
    pub mutation: MutationSettings,
}

impl FuzzMathConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn estimator(&self) -> SuccessEstimator {
        SuccessEstimator::new(self.arith.rounding, self.probability.product_limit)
    }
}
