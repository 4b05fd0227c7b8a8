// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Battery configuration, read from a TOML file.
//!
//! ```toml
//! generators = ["XOR (supergenerator)", "xorshift128", "randu"]
//! seeds = [1234]
//! strategy = "per_test"
//! psamples = 50
//!
//! [etalon]
//! generators = ["stdrng"]
//! xor = true
//! ```

use std::{path::PathBuf, str::FromStr};

use log::LevelFilter;
use serde::Deserialize;

use crate::{
    diehard::Bitstream,
    error::{ConfigError, Result},
    rng_testing::RunSettings,
    selector::{GeneratorRef, SeedStrategy, SelectionRequest},
    sts::{self, Serial},
};

/// Words written when `output_file` is set without `output_count`.
pub const DEFAULT_OUTPUT_COUNT: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Names or ids; an XOR supergenerator must come first.
    pub generators: Vec<GeneratorRef>,
    pub seeds: Vec<u64>,
    pub files: Vec<PathBuf>,
    pub strategy: SeedStrategy,
    /// Runs per test, each test's own default when unset.
    pub psamples: Option<usize>,
    /// Samples per run, each test's own default when unset.
    pub tsamples: Option<usize>,
    /// Bitstream test window mode.
    pub overlap: bool,
    pub serial_ntuple: u32,
    pub etalon: Option<EtalonConfig>,
    /// Write raw words to this file instead of testing.
    pub output_file: Option<PathBuf>,
    pub output_count: usize,
    /// Results are appended here as well as printed.
    pub result_file: Option<PathBuf>,
    pub log_level: String,
}

/// Reference generator folded into an XOR stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtalonConfig {
    pub generators: Vec<GeneratorRef>,
    pub seeds: Vec<u64>,
    pub files: Vec<PathBuf>,
    pub xor: bool,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        BatteryConfig {
            generators: vec!["stdrng".into()],
            seeds: vec![0],
            files: vec![],
            strategy: SeedStrategy::Once,
            psamples: None,
            tsamples: None,
            overlap: true,
            serial_ntuple: sts::DEFAULT_NTUPLE,
            etalon: None,
            output_file: None,
            output_count: DEFAULT_OUTPUT_COUNT,
            result_file: None,
            log_level: "info".to_owned(),
        }
    }
}

impl Default for EtalonConfig {
    fn default() -> Self {
        EtalonConfig {
            generators: vec!["stdrng".into()],
            seeds: vec![0],
            files: vec![],
            xor: true,
        }
    }
}

impl BatteryConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BatteryConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check everything that can be checked without touching the catalog.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.generators.is_empty() {
            return Err(ConfigError::NoGenerators);
        }
        if self.psamples == Some(0) {
            return Err(ConfigError::InvalidSetting {
                key: "psamples",
                detail: "must be greater than 0".to_owned(),
            });
        }
        if self.tsamples == Some(0) {
            return Err(ConfigError::InvalidSetting {
                key: "tsamples",
                detail: "must be greater than 0".to_owned(),
            });
        }
        if self.output_file.is_some() && self.output_count == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "output_count",
                detail: "must be greater than 0".to_owned(),
            });
        }
        if let Some(etalon) = &self.etalon {
            if etalon.generators.len() != 1 {
                return Err(ConfigError::InvalidSetting {
                    key: "etalon.generators",
                    detail: format!("expected one generator, got {}", etalon.generators.len()),
                });
            }
        }
        self.serial()?;
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> std::result::Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level).map_err(|_| ConfigError::InvalidSetting {
            key: "log_level",
            detail: format!("unknown level '{}'", self.log_level),
        })
    }

    pub fn selection_request(&self) -> SelectionRequest {
        SelectionRequest {
            generators: self.generators.clone(),
            seeds: self.seeds.clone(),
            files: self.files.clone(),
        }
    }

    /// Selection of the etalon generator and whether it is folded in.
    pub fn etalon_request(&self) -> Option<(SelectionRequest, bool)> {
        self.etalon.as_ref().map(|etalon| {
            (
                SelectionRequest {
                    generators: etalon.generators.clone(),
                    seeds: etalon.seeds.clone(),
                    files: etalon.files.clone(),
                },
                etalon.xor,
            )
        })
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            psamples: self.psamples,
            tsamples: self.tsamples,
            strategy: self.strategy,
        }
    }

    pub fn bitstream(&self) -> Bitstream {
        Bitstream {
            overlap: self.overlap,
        }
    }

    pub fn serial(&self) -> std::result::Result<Serial, ConfigError> {
        Serial::with_ntuple(self.serial_ntuple)
    }
}
