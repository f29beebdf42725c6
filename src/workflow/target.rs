// src/workflow/target.rs

//! Target definitions: the unit of work the engine schedules.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Resource options attached to a target (e.g. `memory = "8g"`).
///
/// The core never interprets these; they are handed to the executor.
pub type Options = BTreeMap<String, String>;

/// Dense identifier assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(pub(crate) usize);

impl TargetId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structured description of the command a target runs.
///
/// Building the command and rendering it for display are separate steps:
/// executors consume the fields directly, [`CommandSpec::render`] is only for
/// humans (dry-run, status, logs).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// A bash script, run with `-e` so the first failing command fails the
    /// target.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-e").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Render as a single shell-quoted line.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// A registered unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub inputs: Vec<PathBuf>,
    /// Output label -> path.
    pub outputs: BTreeMap<String, PathBuf>,
    pub command: CommandSpec,
    pub options: Options,
}

impl Target {
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into().trim().to_string(),
            inputs: Vec::new(),
            outputs: BTreeMap::new(),
            command,
            options: Options::new(),
        }
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.outputs.insert(label.into(), path.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn output_paths(&self) -> impl Iterator<Item = &Path> {
        self.outputs.values().map(PathBuf::as_path)
    }

    pub fn output_path(&self, label: &str) -> Option<&Path> {
        self.outputs.get(label).map(PathBuf::as_path)
    }
}

/// A target without a name yet, as returned by template functions.
///
/// Register it with [`Registry::target_from_template`] or through
/// [`map`](crate::workflow::mapping::map).
///
/// [`Registry::target_from_template`]: crate::workflow::Registry::target_from_template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTemplate {
    pub inputs: Vec<PathBuf>,
    pub outputs: BTreeMap<String, PathBuf>,
    pub options: Options,
    pub command: CommandSpec,
}

impl TargetTemplate {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            inputs: Vec::new(),
            outputs: BTreeMap::new(),
            options: Options::new(),
            command,
        }
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.outputs.insert(label.into(), path.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn into_target(self, name: impl Into<String>) -> Target {
        Target {
            name: name.into().trim().to_string(),
            inputs: self.inputs,
            outputs: self.outputs,
            command: self.command,
            options: self.options,
        }
    }
}
