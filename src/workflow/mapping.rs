// src/workflow/mapping.rs

//! Fan-out / fan-in helpers.
//!
//! [`map`] instantiates one target per item and keeps the results in item
//! order; [`collect`] regroups the outputs of many targets by label so a
//! single merge target can consume them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{Result, TargetdagError};
use crate::workflow::registry::Registry;
use crate::workflow::target::{TargetId, TargetTemplate};

/// Output paths of one registered target, by label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutputs {
    pub target: String,
    pub outputs: BTreeMap<String, PathBuf>,
}

impl TargetOutputs {
    pub fn get(&self, label: &str) -> Result<&Path> {
        self.outputs
            .get(label)
            .map(PathBuf::as_path)
            .ok_or_else(|| TargetdagError::MissingLabel {
                target: self.target.clone(),
                label: label.to_string(),
            })
    }
}

/// Result of [`map`]: `targets[i]` and `outputs[i]` belong to the i-th item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedTargets {
    pub targets: Vec<TargetId>,
    pub outputs: Vec<TargetOutputs>,
}

impl MappedTargets {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn collect(&self, labels: &[&str]) -> Result<Collected> {
        collect(&self.outputs, labels)
    }
}

/// Result of [`collect`]: pluralised label -> output paths in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub paths: BTreeMap<String, Vec<PathBuf>>,
}

impl Collected {
    /// Paths under a pluralised key, e.g. `x_paths`.
    pub fn get(&self, key: &str) -> Option<&[PathBuf]> {
        self.paths.get(key).map(Vec::as_slice)
    }
}

/// Register one target per item.
///
/// Targets are named `{name}_{index}`. Registration stops at the first error;
/// targets registered before it stay in the registry.
pub fn map<I, T, E, F>(
    registry: &mut Registry,
    name: &str,
    items: I,
    extra: &E,
    mut template: F,
) -> Result<MappedTargets>
where
    I: IntoIterator<Item = T>,
    E: ?Sized,
    F: FnMut(T, &E) -> Result<TargetTemplate>,
{
    let mut mapped = MappedTargets::default();

    for (index, item) in items.into_iter().enumerate() {
        let target_name = format!("{name}_{index}");
        let tpl = template(item, extra)?;
        let outputs = tpl.outputs.clone();
        let id = registry.target_from_template(target_name.clone(), tpl)?;

        mapped.targets.push(id);
        mapped.outputs.push(TargetOutputs {
            target: target_name,
            outputs,
        });
    }

    debug!(name, count = mapped.len(), "mapped template over items");
    Ok(mapped)
}

/// Regroup outputs by label.
pub fn collect(targets: &[TargetOutputs], labels: &[&str]) -> Result<Collected> {
    let mut collected = Collected::default();

    for label in labels {
        let paths = targets
            .iter()
            .map(|t| t.get(label).map(Path::to_path_buf))
            .collect::<Result<Vec<_>>>()?;
        collected.paths.insert(pluralize(label), paths);
    }

    Ok(collected)
}

fn pluralize(label: &str) -> String {
    format!("{label}s")
}
