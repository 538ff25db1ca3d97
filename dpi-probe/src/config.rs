//! Probe configuration loading and parsing

use anyhow::{Context, Result};
use dpi_dispatch::DispatchConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Probe configuration (loaded from probe.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub exercise: ExerciseConfig,
}

/// Sample calls made through every declared import
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExerciseConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Rounds of calls; more than one runs them in parallel
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    /// Text passed to print_header
    #[serde(default = "default_header")]
    pub header: String,
}

fn default_repeat() -> usize {
    1
}

fn default_header() -> String {
    "dpi-probe".to_string()
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repeat: default_repeat(),
            header: default_header(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<ProbeConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: ProbeConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if config.exercise.repeat == 0 {
        anyhow::bail!("exercise.repeat must be at least 1 in {:?}", path);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpi_dispatch::SearchScope;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [dispatch]
            providers = ["build/libpipeline_print.so"]
            scope = "global"

            [exercise]
            enabled = true
            repeat = 8
        "#;

        let config: ProbeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.dispatch.providers.len(), 1);
        assert_eq!(config.dispatch.scope, SearchScope::Global);
        assert!(config.exercise.enabled);
        assert_eq!(config.exercise.repeat, 8);
        assert_eq!(config.exercise.header, "dpi-probe");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ProbeConfig = toml::from_str("").unwrap();
        assert!(config.dispatch.search_process);
        assert!(!config.exercise.enabled);
        assert_eq!(config.exercise.repeat, 1);
    }

    #[test]
    fn test_load_config_rejects_zero_repeat() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[exercise]\nrepeat = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("repeat"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/probe.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
