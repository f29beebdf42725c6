// src/workflow/registry.rs

//! Registration of targets.
//!
//! The registry is an explicit value passed through the build API; there is
//! no process-wide workflow object.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::errors::{Result, TargetdagError};
use crate::workflow::target::{Options, Target, TargetId, TargetTemplate};

/// Pure in-memory store of target definitions.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    targets: Vec<Target>,
    by_name: HashMap<String, TargetId>,
    /// Output path -> producing target.
    producers: HashMap<PathBuf, TargetId>,
    /// Resource options applied to every target unless it sets its own value.
    defaults: Options,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose targets inherit `defaults` as resource options.
    pub fn with_defaults(defaults: Options) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// Register a target.
    ///
    /// Fails without modifying the registry if the name is taken or any of
    /// its outputs is already produced by another target.
    pub fn register(&mut self, mut target: Target) -> Result<TargetId> {
        if self.by_name.contains_key(&target.name) {
            return Err(TargetdagError::DuplicateTarget(target.name));
        }

        for path in target.outputs.values() {
            if let Some(existing) = self.producers.get(path) {
                return Err(TargetdagError::DuplicateOutput {
                    path: path.clone(),
                    existing: self.targets[existing.0].name.clone(),
                    target: target.name.clone(),
                });
            }
        }

        // Two labels of the same target pointing at one path is a collision too.
        let mut own: Vec<&PathBuf> = target.outputs.values().collect();
        own.sort();
        if let Some(w) = own.windows(2).find(|w| w[0] == w[1]) {
            return Err(TargetdagError::DuplicateOutput {
                path: w[0].clone(),
                existing: target.name.clone(),
                target: target.name.clone(),
            });
        }

        for (key, value) in &self.defaults {
            target
                .options
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        let id = TargetId(self.targets.len());
        for path in target.outputs.values() {
            self.producers.insert(path.clone(), id);
        }
        self.by_name.insert(target.name.clone(), id);

        debug!(
            target_name = %target.name,
            id = id.0,
            inputs = target.inputs.len(),
            outputs = target.outputs.len(),
            "registered target"
        );

        self.targets.push(target);
        Ok(id)
    }

    /// Alias of [`Registry::register`].
    pub fn submit(&mut self, target: Target) -> Result<TargetId> {
        self.register(target)
    }

    /// Name a template and register it.
    pub fn target_from_template(
        &mut self,
        name: impl Into<String>,
        template: TargetTemplate,
    ) -> Result<TargetId> {
        self.register(template.into_target(name))
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(id.0)
    }

    pub fn id_of(&self, name: &str) -> Option<TargetId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Targets in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, t)| (TargetId(i), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::target::CommandSpec;

    fn target(name: &str) -> Target {
        Target::new(name, CommandSpec::new("true"))
    }

    #[test]
    fn ids_follow_registration_order() {
        let mut reg = Registry::new();
        let a = reg.register(target("a")).unwrap();
        let b = reg.submit(target("b")).unwrap();

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(reg.get(b).unwrap().name, "b");
        assert_eq!(reg.id_of("a"), Some(a));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_output_is_rejected_and_registry_unchanged() {
        let mut reg = Registry::new();
        reg.register(target("a").output("x", "out.txt")).unwrap();

        let err = reg
            .register(target("b").output("y", "other.txt").output("z", "out.txt"))
            .unwrap_err();

        match err {
            TargetdagError::DuplicateOutput {
                path,
                existing,
                target,
            } => {
                assert_eq!(path, PathBuf::from("out.txt"));
                assert_eq!(existing, "a");
                assert_eq!(target, "b");
            }
            other => panic!("expected DuplicateOutput, got {other:?}"),
        }

        assert_eq!(reg.len(), 1);
        assert!(reg.id_of("b").is_none());
        // other.txt must not have been claimed by the failed registration
        assert!(reg.register(target("c").output("y", "other.txt")).is_ok());
    }

    #[test]
    fn same_path_under_two_labels_is_rejected() {
        let mut reg = Registry::new();
        let err = reg
            .register(target("a").output("x", "out.txt").output("y", "out.txt"))
            .unwrap_err();
        assert!(matches!(err, TargetdagError::DuplicateOutput { .. }));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut reg = Registry::new();
        reg.register(target("a")).unwrap();
        let err = reg.register(target("a")).unwrap_err();
        assert!(matches!(err, TargetdagError::DuplicateTarget(name) if name == "a"));
    }

    #[test]
    fn defaults_fill_in_missing_options_only() {
        let mut defaults = Options::new();
        defaults.insert("account".to_string(), "lab".to_string());
        defaults.insert("memory".to_string(), "1g".to_string());

        let mut reg = Registry::with_defaults(defaults);
        let id = reg.register(target("a").option("memory", "8g")).unwrap();

        let opts = &reg.get(id).unwrap().options;
        assert_eq!(opts.get("account").map(String::as_str), Some("lab"));
        assert_eq!(opts.get("memory").map(String::as_str), Some("8g"));
    }
}
