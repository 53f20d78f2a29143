use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_DIRECTORY: &str = "results";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_RECON_SCRIPT: &str = "scripts/run_recon.sh";
pub const DEFAULT_SCAN_SCRIPT: &str = "scripts/run_web_scan.sh";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Prefix for environment overrides, e.g. `HUNTFLOW__LLM__ENABLED=true`.
pub const ENV_PREFIX: &str = "HUNTFLOW";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are assisting an authorized bug bounty assessment of '{target}'.
Reconnaissance produced the following summary:
---
{summary}
---
Suggest the top 3 potential vulnerabilities or misconfigurations worth testing next, with a short justification for each.";

/// Top-level configuration read from `config/config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output: OutputConfig,
    pub llm: LlmConfig,
    pub scripts: ScriptsConfig,
    /// Extension (without the dot) to launcher tokens; extends the built-in table.
    pub interpreters: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub base_directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from(DEFAULT_BASE_DIRECTORY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub model: String,
    pub prompt_template: String,
    pub provider: String,
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: DEFAULT_MODEL.to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            endpoint: None,
            api_key_env: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub recon: PathBuf,
    pub scan: PathBuf,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            recon: PathBuf::from(DEFAULT_RECON_SCRIPT),
            scan: PathBuf::from(DEFAULT_SCAN_SCRIPT),
        }
    }
}

/// Failures that abort the whole run before any target is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("error parsing configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
}

impl PipelineConfig {
    /// Load a YAML configuration file, overlaying `HUNTFLOW__*` environment variables.
    ///
    /// Keys absent from both sources fall back to their documented defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let layered = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(parse_error)?;
        let loaded: Self = layered.try_deserialize().map_err(parse_error)?;
        tracing::info!("Configuration loaded from {}", path.display());
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::{env, fs, sync::Mutex};

    // Serialises tests that touch HUNTFLOW__* variables.
    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let file = write_config("output:\n  base_directory: out\nllm:\n  enabled: false\n");

        let config = PipelineConfig::load(file.path()).expect("config should load");
        assert_eq!(config.output.base_directory, PathBuf::from("out"));
        assert!(!config.llm.enabled);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.prompt_template, DEFAULT_PROMPT_TEMPLATE);
        assert_eq!(config.scripts, ScriptsConfig::default());
        assert!(config.interpreters.is_empty());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let file = write_config("");
        let config = PipelineConfig::load(file.path()).expect("empty config is valid");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn reads_llm_scripts_and_interpreters() {
        let _guard = ENV_LOCK.lock().unwrap();
        let file = write_config(
            r#"
output:
  base_directory: /tmp/hunt
llm:
  enabled: true
  model: gpt-4o-mini
  provider: anthropic
  api_key_env: MY_KEY
  prompt_template: "Target {target}: {summary}"
scripts:
  recon: tools/recon.py
  scan: tools/scan.sh
interpreters:
  rb: [ruby, -W0]
"#,
        );

        let config = PipelineConfig::load(file.path()).expect("config should load");
        assert!(config.llm.enabled);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.api_key_env.as_deref(), Some("MY_KEY"));
        assert_eq!(config.llm.prompt_template, "Target {target}: {summary}");
        assert_eq!(config.scripts.recon, PathBuf::from("tools/recon.py"));
        assert_eq!(config.scripts.scan, PathBuf::from("tools/scan.sh"));
        assert_eq!(
            config.interpreters.get("rb"),
            Some(&vec!["ruby".to_string(), "-W0".to_string()])
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(dir.path().join("nope.yaml"))
            .expect_err("missing file should error");
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains("nope.yaml"));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        let file = write_config("output: [unterminated\n  - : :\n");
        let err = PipelineConfig::load(file.path()).expect_err("invalid yaml should error");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        let file = write_config("llm:\n  enabled: false\n  model: from-file\n");
        env::set_var("HUNTFLOW__LLM__MODEL", "from-env");
        let result = PipelineConfig::load(file.path());
        env::remove_var("HUNTFLOW__LLM__MODEL");

        let config = result.expect("config should load");
        assert_eq!(config.llm.model, "from-env");
        assert!(!config.llm.enabled);
    }

    #[test]
    fn loads_sample_config_from_repo() {
        let _guard = ENV_LOCK.lock().unwrap();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/config.yaml");
        let config = PipelineConfig::load(path).expect("sample config should parse");
        assert_eq!(config.output.base_directory, PathBuf::from("results"));
        assert!(config.llm.prompt_template.contains("{target}"));
        assert!(config.llm.prompt_template.contains("{summary}"));
    }
}
