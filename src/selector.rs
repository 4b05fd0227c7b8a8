// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Generator selection: resolving names and ids against the catalog,
//! assigning seeds and files, and holding the active generator stream.
//!
//! Seeding works like this. The first declared seed is the master seed.
//! A master seed of 0 means every operand gets a fresh random seed. Any
//! other master seed makes the selection reproducible: the remaining
//! declared seeds go to the operands in order, and operands left without
//! one get seeds drawn from the reference generator seeded with the master
//! seed. A lone master seed seeds the first operand directly.

use std::path::PathBuf;

use log::{debug, warn};
use serde::Deserialize;

use crate::{
    bits::{BitWindowState, WordSource, MAX_WINDOW_BITS},
    error::{ConfigError, ResourceError, Result},
    generator::{GeneratorInstance, Operand, Source},
    registry::{self, GeneratorDescriptor, GVECMAX},
    rngs::RNG,
};

/// A generator named by the user, either by catalog name or by id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GeneratorRef {
    Id(u32),
    Name(String),
}

impl From<u32> for GeneratorRef {
    fn from(id: u32) -> Self {
        GeneratorRef::Id(id)
    }
}

impl From<&str> for GeneratorRef {
    fn from(name: &str) -> Self {
        GeneratorRef::Name(name.to_owned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRequest {
    pub generators: Vec<GeneratorRef>,
    /// Master seed first, then per-operand seeds.
    pub seeds: Vec<u64>,
    /// Consumed in order by file-backed operands.
    pub files: Vec<PathBuf>,
}

/// When a stream is reseeded.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    /// Seed once at selection, tests share one long stream.
    #[default]
    Once,
    /// Reseed (or rewind file streams) at the start of every test.
    PerTest,
}

/// A validated selection, ready to be instantiated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelection {
    pub master_seed: u64,
    /// Set when the XOR supergenerator was requested.
    pub composite: Option<&'static GeneratorDescriptor>,
    pub operands: Vec<Operand>,
}

impl ResolvedSelection {
    /// Number of generators actually producing words.
    pub fn gscount(&self) -> usize {
        self.operands.len()
    }
}

/// Seed from the OS entropy source.
pub fn random_seed() -> u64 {
    rand::random::<u64>()
}

fn lookup(entry: &GeneratorRef) -> std::result::Result<&'static GeneratorDescriptor, ConfigError> {
    match entry {
        GeneratorRef::Name(name) => {
            let id = registry::find_by_name(name).ok_or_else(|| ConfigError::UnknownGenerator {
                name: name.clone(),
            })?;
            registry::find_by_id(id).ok_or(ConfigError::InvalidId { id })
        }
        GeneratorRef::Id(id) => registry::find_by_id(*id).ok_or(ConfigError::InvalidId { id: *id }),
    }
}

fn operand_seeds(master_seed: u64, declared: &[u64], gscount: usize) -> Vec<u64> {
    if master_seed == 0 {
        return (0..gscount).map(|_| random_seed()).collect();
    }
    let mut seeds: Vec<u64> = declared.iter().skip(1).take(gscount).copied().collect();
    if seeds.is_empty() {
        seeds.push(master_seed);
    }
    if seeds.len() < gscount {
        let mut aux = registry::SEED_DERIVATION.build(master_seed);
        warn!(
            "{} of {} seeds were generated from the master seed",
            gscount - seeds.len(),
            gscount
        );
        while seeds.len() < gscount {
            seeds.push(aux.next_u32() as u64);
        }
    }
    seeds
}

/// Validate `request` against the catalog and work out operand seeds and files.
pub fn resolve(request: &SelectionRequest) -> std::result::Result<ResolvedSelection, ConfigError> {
    let count = request.generators.len();
    if count == 0 {
        return Err(ConfigError::NoGenerators);
    }
    if count > GVECMAX {
        return Err(ConfigError::TooManyGenerators {
            count,
            max: GVECMAX,
        });
    }

    let mut descriptors: Vec<&'static GeneratorDescriptor> = Vec::with_capacity(count);
    for (position, entry) in request.generators.iter().enumerate() {
        let descriptor = lookup(entry)?;
        if descriptor.is_composite() && position > 0 {
            return Err(if descriptors[0].is_composite() {
                ConfigError::DuplicateComposite
            } else {
                ConfigError::MisplacedComposite { position }
            });
        }
        if position == 0 && descriptor.is_composite() && count == 1 {
            return Err(ConfigError::XorNeedsOperands);
        }
        descriptors.push(descriptor);
    }

    let composite = Some(descriptors[0]).filter(|d| d.is_composite());
    let leaves = if composite.is_some() {
        &descriptors[1..]
    } else {
        if count > 1 {
            warn!(
                "{} extra generators ignored, only XOR combines several generators",
                count - 1
            );
        }
        &descriptors[..1]
    };

    let mut files = request.files.iter();
    let mut bound = Vec::with_capacity(leaves.len());
    for descriptor in leaves {
        let file = if descriptor.is_file_backed() {
            let path = files.next().ok_or_else(|| ConfigError::MissingFilename {
                generator: descriptor.name.to_owned(),
            })?;
            Some(path.clone())
        } else {
            None
        };
        bound.push(file);
    }

    let master_seed = request.seeds.first().copied().unwrap_or(0);
    let seeds = operand_seeds(master_seed, &request.seeds, leaves.len());
    let operands = leaves
        .iter()
        .zip(seeds)
        .zip(bound)
        .map(|((&descriptor, seed), file)| Operand {
            descriptor,
            seed,
            file,
        })
        .collect();

    Ok(ResolvedSelection {
        master_seed,
        composite,
        operands,
    })
}

/// Build and seed the generator described by `selection`.
pub fn instantiate(selection: &ResolvedSelection) -> std::result::Result<GeneratorInstance, ResourceError> {
    match selection.composite {
        Some(descriptor) => GeneratorInstance::composite(
            descriptor,
            selection.operands.clone(),
            selection.master_seed,
        ),
        None => GeneratorInstance::leaf(&selection.operands[0]),
    }
}

/// A generator together with the bits buffered from it.
pub struct GeneratorStream {
    instance: GeneratorInstance,
    bits: BitWindowState,
    selection: ResolvedSelection,
}

impl GeneratorStream {
    pub fn from_selection(selection: ResolvedSelection) -> std::result::Result<Self, ResourceError> {
        debug!(
            "instantiating selection with {} operand(s), master seed {}",
            selection.gscount(),
            selection.master_seed
        );
        let instance = instantiate(&selection)?;
        Ok(GeneratorStream {
            instance,
            bits: BitWindowState::new(),
            selection,
        })
    }

    pub fn open(request: &SelectionRequest) -> Result<Self> {
        let selection = resolve(request)?;
        Ok(Self::from_selection(selection)?)
    }

    /// Next `width` bits of the stream, `width` in 1..=32.
    pub fn take_bits(&mut self, width: u32, mask: Option<u32>) -> u32 {
        self.bits.take_bits(&mut self.instance, width, mask)
    }

    /// Next 32 bits of the stream.
    pub fn next_word(&mut self) -> u32 {
        self.take_bits(MAX_WINDOW_BITS, Some(u32::MAX))
    }

    pub fn name(&self) -> &'static str {
        self.instance.name()
    }

    pub fn instance(&self) -> &GeneratorInstance {
        &self.instance
    }

    pub fn selection(&self) -> &ResolvedSelection {
        &self.selection
    }

    pub fn residual_count(&self) -> u32 {
        self.bits.residual_count()
    }

    pub fn significant_bits(&self) -> u32 {
        self.instance.significant_bits()
    }

    pub fn rewinds(&self) -> u32 {
        self.instance.rewinds()
    }

    /// Prepare the stream for a new test: drop buffered bits and, for
    /// [`SeedStrategy::PerTest`], reseed. Without a master seed the
    /// operands get new random seeds.
    pub fn reseed(&mut self, strategy: SeedStrategy) -> std::result::Result<(), ResourceError> {
        self.bits.reset();
        if strategy == SeedStrategy::Once {
            return Ok(());
        }
        if self.selection.master_seed == 0 {
            for operand in &mut self.selection.operands {
                operand.seed = random_seed();
            }
        }
        let seeds: Vec<u64> = self.selection.operands.iter().map(|o| o.seed).collect();
        let seed = match self.instance.source_mut() {
            Source::Composite(state) => {
                state.set_seeds(&seeds);
                self.selection.master_seed
            }
            _ => seeds[0],
        };
        debug!("reseeding {} with {:?}", self.instance.name(), seeds);
        self.instance.seed(seed)
    }

    /// Hand `etalon` to the XOR generator of this stream.
    pub fn attach_etalon(
        &mut self,
        etalon: GeneratorInstance,
        fold: bool,
    ) -> std::result::Result<(), ConfigError> {
        match self.instance.source_mut() {
            Source::Composite(state) => {
                debug!("attaching etalon {} (xor: {})", etalon.name(), fold);
                state.attach_etalon(etalon, fold);
                Ok(())
            }
            _ => Err(ConfigError::EtalonRequiresComposite),
        }
    }
}

/// Holds the currently active generator stream.
#[derive(Default)]
pub struct Selector {
    active: Option<GeneratorStream>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active stream with the one `request` describes.
    ///
    /// A request that fails validation leaves the active stream untouched.
    /// Otherwise the old stream and its buffered bits are released before
    /// the new generator is built.
    pub fn select(&mut self, request: &SelectionRequest) -> Result<&mut GeneratorStream> {
        let selection = resolve(request)?;
        if let Some(old) = self.active.take() {
            debug!("releasing {}", old.name());
        }
        let stream = GeneratorStream::from_selection(selection)?;
        Ok(self.active.insert(stream))
    }

    pub fn active(&mut self) -> Option<&mut GeneratorStream> {
        self.active.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, registry::COMPOSITE_ID};

    fn request(generators: Vec<GeneratorRef>, seeds: Vec<u64>) -> SelectionRequest {
        SelectionRequest {
            generators,
            seeds,
            files: vec![],
        }
    }

    #[test]
    fn resolves_names_and_ids() {
        let by_name = resolve(&request(vec!["lehmer64".into()], vec![5])).unwrap();
        let by_id = resolve(&request(vec![2u32.into()], vec![5])).unwrap();
        assert_eq!(by_name, by_id);
        assert_eq!(by_name.gscount(), 1);
        assert!(by_name.composite.is_none());
        assert_eq!(by_name.operands[0].seed, 5);
    }

    #[test]
    fn rejects_unknown_generators() {
        assert_eq!(
            resolve(&request(vec!["no_such_rng".into()], vec![])),
            Err(ConfigError::UnknownGenerator {
                name: "no_such_rng".to_owned()
            })
        );
        assert_eq!(
            resolve(&request(vec![999u32.into()], vec![])),
            Err(ConfigError::InvalidId { id: 999 })
        );
        assert_eq!(
            resolve(&request(vec![5000u32.into()], vec![])),
            Err(ConfigError::InvalidId { id: 5000 })
        );
        assert_eq!(resolve(&request(vec![], vec![])), Err(ConfigError::NoGenerators));
        assert!(matches!(
            resolve(&request(vec![0u32.into(); GVECMAX + 1], vec![])),
            Err(ConfigError::TooManyGenerators { .. })
        ));
    }

    #[test]
    fn composite_placement_rules() {
        assert_eq!(
            resolve(&request(vec![COMPOSITE_ID.into()], vec![1])),
            Err(ConfigError::XorNeedsOperands)
        );
        assert_eq!(
            resolve(&request(
                vec![COMPOSITE_ID.into(), 1u32.into(), COMPOSITE_ID.into()],
                vec![1]
            )),
            Err(ConfigError::DuplicateComposite)
        );
        assert_eq!(
            resolve(&request(vec![1u32.into(), COMPOSITE_ID.into()], vec![1])),
            Err(ConfigError::MisplacedComposite { position: 1 })
        );
    }

    #[test]
    fn composite_operands_skip_the_sentinel() {
        let sel = resolve(&request(
            vec!["XOR (supergenerator)".into(), 1u32.into(), 3u32.into()],
            vec![10, 20, 30],
        ))
        .unwrap();
        assert!(sel.composite.is_some());
        assert_eq!(sel.gscount(), 2);
        assert_eq!(sel.operands[0].descriptor.id, 1);
        assert_eq!(sel.operands[1].descriptor.id, 3);
        assert_eq!(sel.operands[0].seed, 20);
        assert_eq!(sel.operands[1].seed, 30);
    }

    #[test]
    fn missing_seeds_are_derived_reproducibly() {
        let req = request(vec![COMPOSITE_ID.into(), 0u32.into(), 1u32.into(), 2u32.into()], vec![77]);
        let a = resolve(&req).unwrap();
        let b = resolve(&req).unwrap();
        assert_eq!(a, b);
        let seeds: Vec<u64> = a.operands.iter().map(|o| o.seed).collect();
        assert_eq!(seeds[0], 77);
        let mut aux = crate::registry::SEED_DERIVATION.build(77);
        assert_eq!(seeds[1], aux.next_u32() as u64);
        assert_eq!(seeds[2], aux.next_u32() as u64);
    }

    #[test]
    fn zero_master_seed_draws_random_seeds() {
        let sel = resolve(&request(vec![COMPOSITE_ID.into(), 0u32.into(), 1u32.into()], vec![0])).unwrap();
        assert_eq!(sel.master_seed, 0);
        assert_eq!(sel.gscount(), 2);
        let empty = resolve(&request(vec![0u32.into()], vec![])).unwrap();
        assert_eq!(empty.master_seed, 0);
        assert_eq!(empty.gscount(), 1);
    }

    #[test]
    fn file_operands_consume_files_in_order() {
        let mut req = request(
            vec![
                COMPOSITE_ID.into(),
                "file_input_raw".into(),
                0u32.into(),
                "file_input".into(),
            ],
            vec![1],
        );
        req.files = vec![PathBuf::from("a.bin")];
        assert_eq!(
            resolve(&req),
            Err(ConfigError::MissingFilename {
                generator: "file_input".to_owned()
            })
        );
        req.files.push(PathBuf::from("b.txt"));
        let sel = resolve(&req).unwrap();
        assert_eq!(sel.operands[0].file, Some(PathBuf::from("a.bin")));
        assert_eq!(sel.operands[1].file, None);
        assert_eq!(sel.operands[2].file, Some(PathBuf::from("b.txt")));
    }

    #[test]
    fn two_entry_composite_is_its_operand() {
        let mut xor = GeneratorStream::open(&request(
            vec![COMPOSITE_ID.into(), "xorshift128".into()],
            vec![11, 22],
        ))
        .unwrap();
        let mut plain = GeneratorStream::open(&request(vec!["xorshift128".into()], vec![22])).unwrap();
        for _ in 0..64 {
            assert_eq!(xor.next_word(), plain.next_word());
        }
    }

    #[test]
    fn switching_generators_drops_buffered_bits() {
        let mut selector = Selector::new();
        let stream = selector.select(&request(vec!["only_one".into()], vec![1])).unwrap();
        assert_eq!(stream.take_bits(5, None), 0x1f);
        assert_eq!(stream.residual_count(), 27);

        let stream = selector
            .select(&request(vec!["counter".into()], vec![9, 9]))
            .unwrap();
        assert_eq!(stream.residual_count(), 0);
        assert_eq!(stream.take_bits(32, None), 9);
        assert_eq!(stream.take_bits(4, None), 0);
    }

    #[test]
    fn failed_selection_keeps_previous_stream() {
        let mut selector = Selector::new();
        selector.select(&request(vec!["mmix".into()], vec![3])).unwrap();
        let err = selector.select(&request(vec!["bogus".into()], vec![3]));
        assert!(matches!(err, Err(Error::Config(ConfigError::UnknownGenerator { .. }))));
        assert_eq!(selector.active().map(|s| s.name()), Some("mmix"));
    }

    #[test]
    fn per_test_reseed_restarts_stream() {
        let mut stream = GeneratorStream::open(&request(vec![0u32.into()], vec![3])).unwrap();
        let first: Vec<u32> = (0..4).map(|_| stream.next_word()).collect();
        let _ = stream.take_bits(3, None);
        stream.reseed(SeedStrategy::PerTest).unwrap();
        assert_eq!(stream.residual_count(), 0);
        let again: Vec<u32> = (0..4).map(|_| stream.next_word()).collect();
        assert_eq!(first, again);
        stream.reseed(SeedStrategy::Once).unwrap();
        let later: Vec<u32> = (0..4).map(|_| stream.next_word()).collect();
        assert_ne!(first, later);
    }

    #[test]
    fn composite_per_test_reseed_restarts_operands() {
        let mut stream = GeneratorStream::open(&request(
            vec![COMPOSITE_ID.into(), 1u32.into(), 2u32.into()],
            vec![5],
        ))
        .unwrap();
        let first: Vec<u32> = (0..4).map(|_| stream.next_word()).collect();
        stream.reseed(SeedStrategy::PerTest).unwrap();
        let again: Vec<u32> = (0..4).map(|_| stream.next_word()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn per_test_reseed_restarts_etalon() {
        let mut stream = GeneratorStream::open(&request(
            vec![COMPOSITE_ID.into(), "mmix".into()],
            vec![5, 9],
        ))
        .unwrap();
        let etalon =
            instantiate(&resolve(&request(vec!["xorshift128".into()], vec![3])).unwrap()).unwrap();
        stream.attach_etalon(etalon, true).unwrap();

        stream.reseed(SeedStrategy::PerTest).unwrap();
        let first: Vec<u32> = (0..4).map(|_| stream.next_word()).collect();
        stream.reseed(SeedStrategy::PerTest).unwrap();
        let again: Vec<u32> = (0..4).map(|_| stream.next_word()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn etalon_needs_a_composite_stream() {
        let etalon = instantiate(&resolve(&request(vec![51u32.into()], vec![1])).unwrap()).unwrap();
        let mut plain = GeneratorStream::open(&request(vec![54u32.into()], vec![1])).unwrap();
        assert_eq!(
            plain.attach_etalon(etalon, true),
            Err(ConfigError::EtalonRequiresComposite)
        );

        let etalon = instantiate(&resolve(&request(vec![51u32.into()], vec![1])).unwrap()).unwrap();
        let mut xor = GeneratorStream::open(&request(
            vec![COMPOSITE_ID.into(), 54u32.into()],
            vec![1, 0],
        ))
        .unwrap();
        xor.attach_etalon(etalon, true).unwrap();
        assert_eq!(xor.next_word(), !0u32);
    }
}
