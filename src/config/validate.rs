// src/config/validate.rs

use crate::config::model::{RawWorkflowFile, TargetConfig, WorkflowFile};
use crate::dag::Graph;
use crate::errors::{Result, TargetdagError};
use crate::workflow::{CommandSpec, Options, Registry, Target};

impl TryFrom<RawWorkflowFile> for WorkflowFile {
    type Error = TargetdagError;

    fn try_from(raw: RawWorkflowFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_targets(&raw)?;
        validate_global_config(&raw)?;

        let defaults = option_values("[defaults]", &raw.defaults)?;
        let mut registry = Registry::with_defaults(defaults);
        for cfg in &raw.target {
            registry.register(target_from_config(cfg)?)?;
        }

        let graph = Graph::build(&registry)?;

        Ok(WorkflowFile {
            config: raw.config,
            registry,
            graph,
        })
    }
}

fn ensure_has_targets(cfg: &RawWorkflowFile) -> Result<()> {
    if cfg.target.is_empty() {
        return Err(TargetdagError::ConfigError(
            "workflow must contain at least one [[target]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawWorkflowFile) -> Result<()> {
    if cfg.config.concurrency == 0 {
        return Err(TargetdagError::ConfigError(
            "[config].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn target_from_config(cfg: &TargetConfig) -> Result<Target> {
    let name = cfg.name.trim();
    if name.is_empty() {
        return Err(TargetdagError::ConfigError(
            "every [[target]] needs a non-empty name".to_string(),
        ));
    }

    let mut command = match (&cfg.spec, &cfg.program) {
        (Some(script), None) => {
            if !cfg.args.is_empty() {
                return Err(TargetdagError::ConfigError(format!(
                    "target '{name}' sets `args` together with `spec`"
                )));
            }
            CommandSpec::shell(script.clone())
        }
        (None, Some(program)) => CommandSpec::new(program.clone()).args(cfg.args.iter().cloned()),
        (Some(_), Some(_)) => {
            return Err(TargetdagError::ConfigError(format!(
                "target '{name}' sets both `spec` and `program`"
            )));
        }
        (None, None) => {
            return Err(TargetdagError::ConfigError(format!(
                "target '{name}' needs either `spec` or `program`"
            )));
        }
    };
    command.env = cfg.env.clone();
    command.working_dir = cfg.working_dir.clone();

    let mut target = Target::new(name, command).inputs(cfg.inputs.iter().cloned());
    target.outputs = cfg.outputs.clone();
    target.options = option_values(&format!("target '{name}' options"), &cfg.options)?;
    Ok(target)
}

/// Scalars become strings; arrays and tables are rejected.
fn option_values(
    context: &str,
    values: &std::collections::BTreeMap<String, toml::Value>,
) -> Result<Options> {
    values
        .iter()
        .map(|(key, value)| {
            let text = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => {
                    return Err(TargetdagError::ConfigError(format!(
                        "{context}: option '{key}' must be a scalar value"
                    )));
                }
            };
            Ok((key.clone(), text))
        })
        .collect()
}
