use std::str::FromStr;
use serde::Deserialize;

/// How the staleness analyzer compares a target's inputs against its outputs.
///
/// - `Mtime`: outputs are stale when any input was modified strictly later
///   than the oldest output (default).
/// - `Hash`: outputs are stale when the blake3 hash of the input contents
///   differs from the hash recorded after the target last succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StalenessMode {
    #[default]
    Mtime,
    Hash,
}

impl FromStr for StalenessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mtime" => Ok(StalenessMode::Mtime),
            "hash" => Ok(StalenessMode::Hash),
            other => Err(format!(
                "invalid staleness mode: {other} (expected \"mtime\" or \"hash\")"
            )),
        }
    }
}

/// What happens to running targets when a run is cancelled.
///
/// Dispatching stops immediately in both cases.
///
/// - `Drain`: running targets finish and keep their real outcome (default).
/// - `Kill`: running targets are terminated (their processes are killed) and
///   reported as skipped due to cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CancelPolicy {
    #[default]
    Drain,
    Kill,
}

impl FromStr for CancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drain" => Ok(CancelPolicy::Drain),
            "kill" => Ok(CancelPolicy::Kill),
            other => Err(format!(
                "invalid cancel_policy: {other} (expected \"drain\" or \"kill\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_case_insensitively() {
        assert_eq!("HASH".parse::<StalenessMode>(), Ok(StalenessMode::Hash));
        assert_eq!(" kill ".parse::<CancelPolicy>(), Ok(CancelPolicy::Kill));
        assert!("sometimes".parse::<CancelPolicy>().is_err());
    }
}
