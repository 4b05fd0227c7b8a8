// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Error types for generator selection, file streams and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Caller-correctable selection or configuration problems.
/// Nothing is torn down when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no generator was requested")]
    NoGenerators,

    #[error("{count} generators requested, at most {max} are supported")]
    TooManyGenerators { count: usize, max: usize },

    #[error("unknown generator name '{name}'")]
    UnknownGenerator { name: String },

    #[error("no generator with id {id}")]
    InvalidId { id: u32 },

    #[error("no generators for XOR")]
    XorNeedsOperands,

    #[error("multiple XOR generators requested")]
    DuplicateComposite,

    /// The composite generator was named somewhere other than the first slot.
    #[error("XOR generator may only be the first entry, found at position {position}")]
    MisplacedComposite { position: usize },

    #[error("generator {generator} uses file input but no filename has been specified")]
    MissingFilename { generator: String },

    #[error("an etalon generator can only be attached to an XOR stream")]
    EtalonRequiresComposite,

    #[error("serial test ntuple must be in 2..=24, got {ntuple}")]
    InvalidNtuple { ntuple: u32 },

    #[error("invalid setting '{key}': {detail}")]
    InvalidSetting { key: &'static str, detail: String },
}

/// Failures of the backing file of a file-backed generator.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("cannot open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no file bound to file-backed generator {generator}")]
    Unbound { generator: String },

    #[error("'{}' contains no random words", path.display())]
    Empty { path: PathBuf },

    #[error("'{}' line {line}: not an unsigned 32 bit integer", path.display())]
    Parse { path: PathBuf, line: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("malformed configuration file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
