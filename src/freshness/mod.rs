// src/freshness/mod.rs

//! Staleness analysis: which targets need to run.
//!
//! - [`analyzer`] classifies targets by output presence, upstream staleness
//!   and either modification times or input content hashes.
//! - [`hash`] computes blake3 input hashes and stores them between runs.

pub mod analyzer;
pub mod hash;

pub use analyzer::{Analyzer, Freshness, StaleReason, StalenessPlan};
pub use hash::{FileHashStore, HashStore, MemoryHashStore};
