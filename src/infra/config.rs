use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime configuration loaded from `config.yaml`.
///
/// Every field except `ollama_host` has a default; a missing host is a
/// fatal load error rather than something to paper over at request time.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_error_lines")]
    pub max_error_lines: usize,
    pub ollama_host: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_file() -> String {
    "analyzer.log".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_max_error_lines() -> usize {
    300
}

fn default_model() -> String {
    "mistral".to_string()
}

impl AnalyzerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AnalyzerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let (_dir, path) = write_config("ollama_host: http://192.168.1.10:11434\n");
        let cfg = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(cfg.ollama_host, "http://192.168.1.10:11434");
        assert_eq!(cfg.log_dir, PathBuf::from("./logs"));
        assert_eq!(cfg.log_file, "analyzer.log");
        assert_eq!(cfg.log_level, "INFO");
        assert_eq!(cfg.max_error_lines, 300);
        assert_eq!(cfg.model, "mistral");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let (_dir, path) = write_config(
            "ollama_host: http://localhost:11434\n\
             model: llama3\n\
             max_error_lines: 50\n\
             log_level: DEBUG\n",
        );
        let cfg = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(cfg.model, "llama3");
        assert_eq!(cfg.max_error_lines, 50);
        assert_eq!(cfg.log_level, "DEBUG");
    }

    #[test]
    fn missing_ollama_host_is_fatal() {
        let (_dir, path) = write_config("model: mistral\n");
        let err = AnalyzerConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = AnalyzerConfig::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
