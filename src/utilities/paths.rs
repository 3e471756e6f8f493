//! Process-level configuration for the runtime.
//!
//! Corresponds to the "Config (C8)" ambient layer: the descriptor directory
//! location, the hot-reload debounce window, and the per-descriptor defaults
//! from the data model, loaded from environment variables with struct-literal
//! fallbacks.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default debounce window for the descriptor-directory watcher.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Default bound for embedding-persistence writes triggered by hot-reload,
/// independent of the per-execution timeout so a slow disk cannot block the
/// watcher.
pub const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `maxSteps` for an agent descriptor that does not specify one.
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Default per-execution timeout for a descriptor that does not specify one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default `maxIterations` for an evaluation config that does not specify one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 2;

/// Default `minQualityScore` for an evaluation config that does not specify one.
pub const DEFAULT_MIN_QUALITY_SCORE: f64 = 0.7;

/// Process-wide runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory scanned for `.yaml`/`.yml` agent descriptors.
    pub descriptor_dir: PathBuf,
    /// Debounce window applied to filesystem events before a reload.
    pub debounce: Duration,
    /// Bound applied to embedding-persistence writes during hot-reload.
    pub persist_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            descriptor_dir: default_descriptor_dir(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            persist_timeout: DEFAULT_PERSIST_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    /// Build a `RuntimeConfig` from environment variables, falling back to
    /// the struct defaults for anything unset.
    ///
    /// - `AGENTRT_DESCRIPTOR_DIR` — descriptor directory path.
    /// - `AGENTRT_DEBOUNCE_MS` — debounce window in milliseconds.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = env::var("AGENTRT_DESCRIPTOR_DIR") {
            cfg.descriptor_dir = PathBuf::from(dir);
        }
        if let Ok(ms) = env::var("AGENTRT_DEBOUNCE_MS") {
            if let Ok(parsed) = ms.parse::<u64>() {
                cfg.debounce = Duration::from_millis(parsed);
            }
        }
        cfg
    }
}

/// Default descriptor directory: `./agents` under the current working
/// directory, or `AGENTRT_DESCRIPTOR_DIR` if set.
fn default_descriptor_dir() -> PathBuf {
    env::var("AGENTRT_DESCRIPTOR_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("agents")
        })
}

/// Parse a human-readable duration string (`"120s"`, `"2m"`, `"500ms"`) as
/// used in descriptor files for `timeout`. Bare integers are treated as
/// seconds. Unrecognised suffixes are an error.
pub fn parse_human_duration(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (digits, suffix) = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .map(|idx| trimmed.split_at(idx))
        .unwrap_or((trimmed, "s"));

    let value: f64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {input}"))?;

    let seconds = match suffix.trim() {
        "" | "s" => value,
        "ms" => value / 1000.0,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unrecognised duration suffix: {other}")),
    };

    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds() {
        assert_eq!(parse_human_duration("120s").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn parses_minutes() {
        assert_eq!(parse_human_duration("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn parses_bare_integer_as_seconds() {
        assert_eq!(parse_human_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn rejects_unknown_suffix() {
        assert!(parse_human_duration("5x").is_err());
    }
}
