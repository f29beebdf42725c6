// src/workflow/mod.rs

//! Build-time API: targets, the registry and the map/collect helpers.

pub mod mapping;
pub mod registry;
pub mod target;

pub use mapping::{Collected, MappedTargets, TargetOutputs, collect, map};
pub use registry::Registry;
pub use target::{CommandSpec, Options, Target, TargetId, TargetTemplate};
