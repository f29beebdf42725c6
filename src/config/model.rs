// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::dag::Graph;
use crate::engine::{DEFAULT_CONCURRENCY, RunOptions};
use crate::types::{CancelPolicy, StalenessMode};
use crate::workflow::Registry;

/// Workflow file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// concurrency = 4
/// staleness = "mtime"
///
/// [defaults]
/// account = "ari-intern"
///
/// [[target]]
/// name = "uppercase_0"
/// inputs = ["data/input_file1.txt"]
/// outputs = { uppercased_path = "steps/input_file1_uppercased.txt" }
/// options = { memory = "8g" }
/// spec = "tr '[:lower:]' '[:upper:]' < data/input_file1.txt > steps/input_file1_uppercased.txt"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawWorkflowFile {
    /// Run behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Default resource options from `[defaults]`.
    #[serde(default)]
    pub defaults: BTreeMap<String, toml::Value>,

    /// All targets from `[[target]]`, in declaration order.
    #[serde(default)]
    pub target: Vec<TargetConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of targets running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// `"mtime"` (default) or `"hash"`.
    #[serde(default)]
    pub staleness: StalenessMode,

    /// `"drain"` (default) or `"kill"`.
    #[serde(default)]
    pub cancel_policy: CancelPolicy,

    /// Journal, hashes and logs live here, relative to the workflow file.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".targetdag")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            staleness: StalenessMode::default(),
            cancel_policy: CancelPolicy::default(),
            state_dir: default_state_dir(),
        }
    }
}

impl ConfigSection {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            concurrency: self.concurrency,
            cancel_policy: self.cancel_policy,
            staleness: self.staleness,
        }
    }
}

/// One `[[target]]` entry.
///
/// The command is either a bash script (`spec`) or a program with arguments
/// (`program` + `args`), never both.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub name: String,

    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    /// Output label -> path.
    #[serde(default)]
    pub outputs: BTreeMap<String, PathBuf>,

    /// Resource options; scalar values are stored as strings.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,

    /// Bash script run with `bash -e -c`.
    #[serde(default)]
    pub spec: Option<String>,

    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Validated workflow: settings plus the registry and graph built from it.
#[derive(Debug, Clone)]
pub struct WorkflowFile {
    pub config: ConfigSection,
    pub registry: Registry,
    pub graph: Graph,
}
