// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Statistical test battery for random number generators.
//!
//! Generators are picked from a fixed catalog by name or id, optionally
//! combined by XOR, and read through a bit window engine that hands out
//! windows of any width up to 32 bits. Tests implement
//! [`rng_testing::StatTest`] and turn the windows into p-values.

pub mod bits;
pub mod config;
pub mod diehard;
pub mod error;
pub mod generator;
pub mod registry;
pub mod rng_testing;
pub mod rngs;
pub mod selector;
pub mod stats;
pub mod strings;
pub mod sts;
pub mod utils;
