//! Server configuration.

use std::env;
use std::path::PathBuf;

/// Server configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,

    /// Directory render artifacts are written to, served from, and swept
    /// out of.
    pub output_dir: PathBuf,

    /// Node script implementing the rendering-engine side of the stdio
    /// protocol (see the `engine` module).
    pub engine_script: PathBuf,

    /// Optional browser executable override handed to the engine.
    pub browser_executable: Option<String>,

    /// Development mode exposes full error detail on failed tasks.
    pub development: bool,

    /// How long finished tasks and their artifacts are retained, in hours.
    pub retention_hours: i64,

    /// How often the retention sweeper runs, in seconds.
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Build a Config from environment variables, with sensible defaults
    /// for every knob.
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("PORT", 3000),
            output_dir: PathBuf::from(
                env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".into()),
            ),
            engine_script: PathBuf::from(
                env::var("ENGINE_SCRIPT").unwrap_or_else(|_| "engine/render.mjs".into()),
            ),
            browser_executable: env::var("BROWSER_EXECUTABLE").ok(),
            development: env::var("ENVIRONMENT")
                .map(|v| v == "development")
                .unwrap_or(false),
            retention_hours: env_parsed("RETENTION_HOURS", 24),
            sweep_interval_secs: env_parsed("SWEEP_INTERVAL_SECS", 3600),
        }
    }
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Only checks the keys the test runner does not set.
        let config = Config::from_env();
        assert_eq!(config.retention_hours, 24);
        assert_eq!(config.sweep_interval_secs, 3600);
    }
}
