#![allow(dead_code)]

use targetdag::dag::Graph;
use targetdag::workflow::{CommandSpec, Registry, Target};

/// Builder for a [`Registry`] to simplify test setup.
///
/// Every helper registers immediately and panics on registration errors;
/// use [`Registry`] directly to test those.
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// A target running `true` with the given inputs and labelled outputs.
    pub fn target(self, name: &str, inputs: &[&str], outputs: &[(&str, &str)]) -> Self {
        let mut target = Target::new(name, CommandSpec::new("true")).inputs(inputs.iter().copied());
        for (label, path) in outputs {
            target = target.output(*label, *path);
        }
        self.with(target)
    }

    pub fn with(mut self, target: Target) -> Self {
        self.registry
            .register(target)
            .expect("failed to register test target");
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }

    pub fn graph(self) -> Graph {
        Graph::build(&self.registry).expect("failed to build test graph")
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `a -> b -> d` and `a -> c -> d`, writing `<name>.out`.
pub fn diamond() -> Graph {
    RegistryBuilder::new()
        .target("a", &[], &[("out", "a.out")])
        .target("b", &["a.out"], &[("out", "b.out")])
        .target("c", &["a.out"], &[("out", "c.out")])
        .target("d", &["b.out", "c.out"], &[("out", "d.out")])
        .graph()
}

/// `t0 -> t1 -> ... -> t{n-1}`, the first one reading `input.txt`.
pub fn chain(n: usize) -> Graph {
    let mut builder = RegistryBuilder::new();
    for i in 0..n {
        let input = if i == 0 {
            "input.txt".to_string()
        } else {
            format!("t{}.out", i - 1)
        };
        let output = format!("t{i}.out");
        builder = builder.target(&format!("t{i}"), &[input.as_str()], &[("out", output.as_str())]);
    }
    builder.graph()
}
