// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Running generator instances.
//!
//! A [`GeneratorInstance`] wraps one of three sources: an elementary
//! algorithm, a file of recorded words, or the XOR combination of several
//! other instances. Dropping an instance releases its state.

use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{
    bits::WordSource,
    error::ResourceError,
    registry::{FileFormat, GeneratorDescriptor, GeneratorKind},
    rngs::RNG,
};

/// One resolved leaf of a selection: what to build, how to seed it and,
/// for file-backed generators, where to read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub descriptor: &'static GeneratorDescriptor,
    pub seed: u64,
    pub file: Option<PathBuf>,
}

/// Words read back from a file. Reaching the end rewinds to the start.
pub struct FileSource {
    path: PathBuf,
    words: FileWords,
    rewinds: u32,
}

enum FileWords {
    Ascii { values: Vec<u32>, position: usize },
    Raw(BufReader<File>),
}

impl FileSource {
    pub fn open(path: &Path, format: FileFormat) -> Result<Self, ResourceError> {
        let file = File::open(path).map_err(|source| ResourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let words = match format {
            FileFormat::Ascii => FileWords::Ascii {
                values: parse_ascii(path, file)?,
                position: 0,
            },
            FileFormat::Raw => {
                let len = file
                    .metadata()
                    .map_err(|source| ResourceError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?
                    .len();
                if len < 4 {
                    return Err(ResourceError::Empty {
                        path: path.to_path_buf(),
                    });
                }
                FileWords::Raw(BufReader::new(file))
            }
        };
        debug!("opened {} for file input", path.display());
        Ok(FileSource {
            path: path.to_path_buf(),
            words,
            rewinds: 0,
        })
    }

    /// Number of times the file ran out and was started over.
    pub fn rewinds(&self) -> u32 {
        self.rewinds
    }

    /// Go back to the first word.
    pub fn rewind(&mut self) -> Result<(), ResourceError> {
        match &mut self.words {
            FileWords::Ascii { position, .. } => *position = 0,
            FileWords::Raw(reader) => {
                reader
                    .seek(SeekFrom::Start(0))
                    .map_err(|source| ResourceError::Read {
                        path: self.path.clone(),
                        source,
                    })?;
            }
        }
        Ok(())
    }

    fn wrap_around(&mut self) {
        self.rewinds += 1;
        warn!(
            "{}: end of file reached, rewinding (rewind #{}); the current run is no longer independent",
            self.path.display(),
            self.rewinds
        );
        if let Err(err) = self.rewind() {
            panic!("file input cannot continue: {}", err);
        }
    }

    fn next_word(&mut self) -> u32 {
        let mut rewound = false;
        loop {
            match &mut self.words {
                FileWords::Ascii { values, position } => {
                    if *position < values.len() {
                        let word = values[*position];
                        *position += 1;
                        return word;
                    }
                }
                FileWords::Raw(reader) => {
                    let mut bytes = [0u8; 4];
                    match reader.read_exact(&mut bytes) {
                        Ok(()) => return u32::from_le_bytes(bytes),
                        Err(err) if err.kind() == ErrorKind::UnexpectedEof => {}
                        Err(err) => panic!(
                            "file input cannot continue: {}: {}",
                            self.path.display(),
                            err
                        ),
                    }
                }
            }
            if rewound {
                panic!(
                    "file input cannot continue: {} has no complete word left",
                    self.path.display()
                );
            }
            self.wrap_around();
            rewound = true;
        }
    }
}

/// Parse one unsigned word per line. Blank lines, `#` comments and
/// `key: value` header lines are skipped.
fn parse_ascii(path: &Path, mut file: File) -> Result<Vec<u32>, ResourceError> {
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|source| ResourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let mut values = vec![];
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.contains(':') {
            continue;
        }
        let value = line.parse::<u32>().map_err(|_| ResourceError::Parse {
            path: path.to_path_buf(),
            line: line_no + 1,
        })?;
        values.push(value);
    }
    if values.is_empty() {
        return Err(ResourceError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(values)
}

/// State of the XOR supergenerator.
///
/// Operand instances are built the first time the composite is seeded.
/// All operands are assumed to have the same word width.
pub struct CompositeState {
    plan: Vec<Operand>,
    operands: Vec<GeneratorInstance>,
    etalon: Option<Box<GeneratorInstance>>,
    etalon_xor: bool,
}

impl CompositeState {
    pub fn new(plan: Vec<Operand>) -> Self {
        CompositeState {
            plan,
            operands: vec![],
            etalon: None,
            etalon_xor: false,
        }
    }

    /// Replace the per-operand seeds used by the next [`GeneratorInstance::seed`].
    pub fn set_seeds(&mut self, seeds: &[u64]) {
        for (operand, &seed) in self.plan.iter_mut().zip(seeds) {
            operand.seed = seed;
        }
    }

    /// Fold `etalon`'s draws into every combined word when `fold` is set.
    pub fn attach_etalon(&mut self, etalon: GeneratorInstance, fold: bool) {
        self.etalon = Some(Box::new(etalon));
        self.etalon_xor = fold;
    }

    fn draw(&mut self) -> u32 {
        let mut combined = self.operands.iter_mut().fold(0, |acc, op| acc ^ op.draw());
        if self.etalon_xor {
            if let Some(etalon) = self.etalon.as_mut() {
                combined ^= etalon.draw();
            }
        }
        combined
    }

    /// (Re)seed every operand with its resolved seed and restart the
    /// etalon from the seed it was built with.
    fn seed(&mut self) -> Result<(), ResourceError> {
        if self.operands.is_empty() {
            self.operands = self
                .plan
                .iter()
                .map(GeneratorInstance::leaf)
                .collect::<Result<Vec<_>, _>>()?;
            let widths: Vec<u32> = self.operands.iter().map(|o| o.significant_bits()).collect();
            if widths.windows(2).any(|w| w[0] != w[1]) {
                warn!("XOR operands have differing word widths {:?}", widths);
            }
        }
        for (instance, operand) in self.operands.iter_mut().zip(&self.plan) {
            instance.seed(operand.seed)?;
        }
        if let Some(etalon) = self.etalon.as_mut() {
            let seed = etalon.current_seed();
            etalon.seed(seed)?;
        }
        Ok(())
    }
}

/// Where a generator's words come from.
pub enum Source {
    Standard(Box<dyn RNG>),
    File(FileSource),
    Composite(CompositeState),
}

impl Source {
    fn draw(&mut self) -> u32 {
        match self {
            Source::Standard(rng) => rng.next_native(),
            Source::File(file) => file.next_word(),
            Source::Composite(state) => state.draw(),
        }
    }

    fn seed(&mut self, seed: u64) -> Result<(), ResourceError> {
        match self {
            Source::Standard(rng) => {
                rng.reseed(seed);
                Ok(())
            }
            Source::File(file) => file.rewind(),
            Source::Composite(state) => state.seed(),
        }
    }
}

/// A selected, seeded generator.
pub struct GeneratorInstance {
    descriptor: &'static GeneratorDescriptor,
    source: Source,
    seed: u64,
    max_value: u32,
    significant_bits: u32,
    bit_mask: u32,
}

impl GeneratorInstance {
    fn with_source(descriptor: &'static GeneratorDescriptor, source: Source, seed: u64) -> Self {
        let max_value = descriptor.max_value;
        let mut rmax = max_value;
        let mut significant_bits = 0;
        let mut bit_mask = 0u32;
        while rmax != 0 {
            rmax >>= 1;
            bit_mask = (bit_mask << 1) | 1;
            significant_bits += 1;
        }
        GeneratorInstance {
            descriptor,
            source,
            seed,
            max_value,
            significant_bits,
            bit_mask,
        }
    }

    /// Build a standard or file-backed generator, seeded with `operand.seed`.
    ///
    /// Selections never hand the XOR descriptor out as an operand.
    pub(crate) fn leaf(operand: &Operand) -> Result<Self, ResourceError> {
        let descriptor = operand.descriptor;
        let source = match descriptor.kind {
            GeneratorKind::Standard(algorithm) => Source::Standard(algorithm.build(operand.seed)),
            GeneratorKind::File(format) => {
                let path = operand
                    .file
                    .as_deref()
                    .ok_or_else(|| ResourceError::Unbound {
                        generator: descriptor.name.to_owned(),
                    })?;
                Source::File(FileSource::open(path, format)?)
            }
            GeneratorKind::Composite => {
                panic!("{} cannot be built as a leaf generator", descriptor.name)
            }
        };
        debug!("creating {} with seed {}", descriptor.name, operand.seed);
        Ok(Self::with_source(descriptor, source, operand.seed))
    }

    /// Build the XOR supergenerator over `operands` and seed them.
    pub fn composite(
        descriptor: &'static GeneratorDescriptor,
        operands: Vec<Operand>,
        seed: u64,
    ) -> Result<Self, ResourceError> {
        debug!(
            "creating {} over {:?}",
            descriptor.name,
            operands.iter().map(|o| o.descriptor.name).collect::<Vec<_>>()
        );
        let mut instance =
            Self::with_source(descriptor, Source::Composite(CompositeState::new(operands)), seed);
        instance.source.seed(seed)?;
        Ok(instance)
    }

    pub fn descriptor(&self) -> &'static GeneratorDescriptor {
        self.descriptor
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn current_seed(&self) -> u64 {
        self.seed
    }

    pub fn max_value(&self) -> u32 {
        self.max_value
    }

    pub fn bit_mask(&self) -> u32 {
        self.bit_mask
    }

    pub fn source_mut(&mut self) -> &mut Source {
        &mut self.source
    }

    /// Restart the generator from `seed`. File streams rewind instead,
    /// composites reseed their operands with their own resolved seeds.
    pub fn seed(&mut self, seed: u64) -> Result<(), ResourceError> {
        self.seed = seed;
        self.source.seed(seed)
    }

    /// Total rewinds of every file stream feeding this generator.
    pub fn rewinds(&self) -> u32 {
        match &self.source {
            Source::Standard(_) => 0,
            Source::File(file) => file.rewinds(),
            Source::Composite(state) => {
                state.operands.iter().map(|o| o.rewinds()).sum::<u32>()
                    + state.etalon.as_ref().map_or(0, |e| e.rewinds())
            }
        }
    }
}

impl WordSource for GeneratorInstance {
    fn draw(&mut self) -> u32 {
        self.source.draw()
    }

    fn significant_bits(&self) -> u32 {
        self.significant_bits
    }
}

impl Drop for GeneratorInstance {
    fn drop(&mut self) {
        debug!("freeing {}", self.descriptor.name);
    }
}
