// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Fixed catalog of the generators the battery knows about.
//!
//! Every entry has a stable numeric id and a unique name. Lookups by name
//! compare at most [`GENERATOR_NAME_MAX`] bytes. Ids range over
//! `0..MAX_RNGS`, most of which are unused.

use crate::rngs::{self, RNG};

/// Size of the id space.
pub const MAX_RNGS: u32 = 1000;
/// Number of significant bytes when comparing generator names.
pub const GENERATOR_NAME_MAX: usize = 20;
/// Upper bound on entries in a single selection request.
pub const GVECMAX: usize = 100;
/// Id of the XOR supergenerator.
pub const COMPOSITE_ID: u32 = 207;

/// The elementary algorithms a standard entry can be built from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Algorithm {
    Reference,
    XorShift128,
    Lehmer64,
    Mmix,
    Randu,
    UlsLcg512,
    UlsLcg512H,
    StreamNlarx,
    OnlyZero,
    OnlyOne,
    AlternatingBlocks,
    AlternatingBytes,
    Counter,
}

/// Generator used to derive operand seeds that the user did not supply.
pub const SEED_DERIVATION: Algorithm = Algorithm::Reference;

impl Algorithm {
    /// Construct a seeded instance of the algorithm.
    pub fn build(self, seed: u64) -> Box<dyn RNG> {
        match self {
            Algorithm::Reference => Box::new(rngs::ReferenceRand::new(seed)),
            Algorithm::XorShift128 => Box::new(rngs::xorshift::XORShift128::new(seed)),
            Algorithm::Lehmer64 => Box::new(rngs::lcg::Lehmer64::new(seed)),
            Algorithm::Mmix => Box::new(rngs::lcg::Mmix::new(seed)),
            Algorithm::Randu => Box::new(rngs::lcg::Randu::new(seed)),
            Algorithm::UlsLcg512 => Box::new(rngs::lcg::UlsLcg512::new(seed)),
            Algorithm::UlsLcg512H => Box::new(rngs::lcg::UlsLcg512H::new(seed)),
            Algorithm::StreamNlarx => Box::new(rngs::stream_nlarx::StreamNLARXu128::new(seed)),
            Algorithm::OnlyZero => Box::new(rngs::testgens::OnlyZero::new(seed)),
            Algorithm::OnlyOne => Box::new(rngs::testgens::OnlyOne::new(seed)),
            Algorithm::AlternatingBlocks => {
                Box::new(rngs::testgens::AlternatingBlocks::new(seed))
            }
            Algorithm::AlternatingBytes => Box::new(rngs::testgens::AlternatingBytes::new(seed)),
            Algorithm::Counter => Box::new(rngs::testgens::Counter::new(seed)),
        }
    }
}

/// On-disk layout of a file-backed generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileFormat {
    /// One unsigned decimal per line, with optional header lines.
    Ascii,
    /// Little-endian 32 bit words.
    Raw,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeneratorKind {
    Standard(Algorithm),
    File(FileFormat),
    /// The XOR supergenerator; never instantiated as a leaf.
    Composite,
}

#[derive(Debug, PartialEq, Eq)]
pub struct GeneratorDescriptor {
    pub name: &'static str,
    pub id: u32,
    /// Largest value a single draw can produce.
    pub max_value: u32,
    pub kind: GeneratorKind,
}

impl GeneratorDescriptor {
    pub fn is_file_backed(&self) -> bool {
        matches!(self.kind, GeneratorKind::File(_))
    }

    pub fn is_composite(&self) -> bool {
        self.kind == GeneratorKind::Composite
    }

    /// Bits per draw.
    pub fn word_width(&self) -> u32 {
        u32::BITS - self.max_value.leading_zeros()
    }
}

const fn standard(name: &'static str, id: u32, algorithm: Algorithm) -> GeneratorDescriptor {
    GeneratorDescriptor {
        name,
        id,
        max_value: u32::MAX,
        kind: GeneratorKind::Standard(algorithm),
    }
}

static CATALOG: [GeneratorDescriptor; 16] = [
    standard("stdrng", 0, Algorithm::Reference),
    standard("xorshift128", 1, Algorithm::XorShift128),
    standard("lehmer64", 2, Algorithm::Lehmer64),
    standard("mmix", 3, Algorithm::Mmix),
    GeneratorDescriptor {
        name: "randu",
        id: 4,
        max_value: 0x7fff_ffff,
        kind: GeneratorKind::Standard(Algorithm::Randu),
    },
    standard("uls_lcg512", 5, Algorithm::UlsLcg512),
    standard("uls_lcg512h", 6, Algorithm::UlsLcg512H),
    standard("stream_nlarx", 7, Algorithm::StreamNlarx),
    standard("only_zero", 50, Algorithm::OnlyZero),
    standard("only_one", 51, Algorithm::OnlyOne),
    standard("alternating_blocks", 52, Algorithm::AlternatingBlocks),
    standard("alternating_bytes", 53, Algorithm::AlternatingBytes),
    standard("counter", 54, Algorithm::Counter),
    GeneratorDescriptor {
        name: "file_input",
        id: 201,
        max_value: u32::MAX,
        kind: GeneratorKind::File(FileFormat::Ascii),
    },
    GeneratorDescriptor {
        name: "file_input_raw",
        id: 202,
        max_value: u32::MAX,
        kind: GeneratorKind::File(FileFormat::Raw),
    },
    GeneratorDescriptor {
        name: "XOR (supergenerator)",
        id: COMPOSITE_ID,
        max_value: u32::MAX,
        kind: GeneratorKind::Composite,
    },
];

fn names_match(a: &str, b: &str) -> bool {
    a.bytes()
        .take(GENERATOR_NAME_MAX)
        .eq(b.bytes().take(GENERATOR_NAME_MAX))
}

/// Look up the id of the generator called `name`.
pub fn find_by_name(name: &str) -> Option<u32> {
    CATALOG
        .iter()
        .find(|d| names_match(d.name, name))
        .map(|d| d.id)
}

pub fn find_by_id(id: u32) -> Option<&'static GeneratorDescriptor> {
    if id >= MAX_RNGS {
        return None;
    }
    CATALOG.iter().find(|d| d.id == id)
}

/// One line per generator, for telling the user what can be selected.
pub fn list_generators() -> String {
    CATALOG
        .iter()
        .map(|d| format!("{:>4} | {:<20} | {:>2} bits", d.id, d.name, d.word_width()))
        .collect::<Vec<String>>()
        .join("\n")
}
