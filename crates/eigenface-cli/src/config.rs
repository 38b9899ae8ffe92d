use anyhow::{Context, Result};
use eigenface_core::RecognizerConfig;
use std::path::{Path, PathBuf};

/// CLI configuration, loaded from an optional TOML file and environment variables.
pub struct Config {
    /// TOML file the recognizer settings were read from, if any.
    pub config_file: Option<PathBuf>,
    pub recognizer: RecognizerConfig,
}

impl Config {
    /// Load configuration from `EIGENFACE_*` environment variables with defaults.
    ///
    /// `config_file` (from `--config`) takes precedence over `EIGENFACE_CONFIG`.
    /// `EIGENFACE_COMPONENTS` and `EIGENFACE_NEIGHBORS` override the file.
    pub fn from_env(config_file: Option<PathBuf>) -> Result<Self> {
        let config_file =
            config_file.or_else(|| std::env::var("EIGENFACE_CONFIG").ok().map(PathBuf::from));

        let mut recognizer = match &config_file {
            Some(path) => load_file(path)?,
            None => RecognizerConfig::default(),
        };
        recognizer.components = env_usize("EIGENFACE_COMPONENTS", recognizer.components);
        recognizer.neighbors = env_usize("EIGENFACE_NEIGHBORS", recognizer.neighbors);

        Ok(Self {
            config_file,
            recognizer,
        })
    }
}

fn load_file(path: &Path) -> Result<RecognizerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = parse(&text).with_context(|| format!("invalid config {}", path.display()))?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

fn parse(text: &str) -> Result<RecognizerConfig, toml::de::Error> {
    toml::from_str(text)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eigenface_core::config::{DEFAULT_NEIGHBORS, MIN_THRESHOLD};

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = parse(
            r#"
            components = 4

            [classifier]
            min_threshold = 900.0

            [localizer]
            hue_max = 140.0
            "#,
        )
        .unwrap();
        assert_eq!(config.components, 4);
        assert_eq!(config.neighbors, DEFAULT_NEIGHBORS);
        assert_eq!(config.classifier.min_threshold, 900.0);
        assert_eq!(config.localizer.hue_max, 140.0);
        assert_eq!(config.localizer.hue_min, 70.0);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = parse("").unwrap();
        assert_eq!(config.classifier.min_threshold, MIN_THRESHOLD);
        assert_eq!(config.components, RecognizerConfig::default().components);
    }

    #[test]
    fn test_bad_toml_rejected() {
        assert!(parse("components = \"many\"").is_err());
    }

    #[test]
    fn test_env_usize_falls_back() {
        assert_eq!(env_usize("EIGENFACE_TEST_UNSET_VARIABLE", 7), 7);
    }

    #[test]
    fn test_config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eigenface.toml");
        std::fs::write(&path, "neighbors = 3\n").unwrap();
        let config = load_file(&path).unwrap();
        assert_eq!(config.neighbors, 3);
        assert!(load_file(&dir.path().join("missing.toml")).is_err());
    }
}
