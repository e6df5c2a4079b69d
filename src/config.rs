//! Configuration file support
//!
//! The configuration is read once at startup, from JSON (`config.json`) or
//! TOML (`*.toml`), and shared read-only behind an `Arc`.

use crate::error::ConfigError;
use crate::request::{CFG_SCALE_RANGE, DIMENSION_RANGE, SAMPLERS, STEPS_RANGE};
use imagent::TransparencyThresholds;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WebUI base URL, e.g. `http://127.0.0.1:7860`
    pub base_url: String,

    /// Checkpoint used when a call does not name one
    pub default_model: String,

    /// txt2img endpoint path, appended to `base_url`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Generation request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Timeout in seconds for options and introspection calls
    #[serde(default = "default_options_timeout")]
    pub options_timeout: f64,

    #[serde(default)]
    pub default_vae: Option<String>,

    #[serde(default)]
    pub default_params: DefaultParams,

    #[serde(default)]
    pub prompt_suggestions: PromptSuggestions,

    /// Base directory for relative output paths (default: executable directory)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub transparency: TransparencyThresholds,

    /// Hold a lock across model switching and generation
    #[serde(default = "default_serialize_generation")]
    pub serialize_generation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultParams {
    #[serde(default = "default_size")]
    pub width: u32,

    #[serde(default = "default_size")]
    pub height: u32,

    #[serde(default = "default_steps")]
    pub steps: u32,

    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f64,

    #[serde(default = "default_sampler", alias = "sampler")]
    pub sampler_index: String,
}

/// Prompt template dictionaries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSuggestions {
    #[serde(default)]
    pub character_prompts: BTreeMap<String, Fragment>,

    #[serde(default)]
    pub style_modifiers: BTreeMap<String, Fragment>,

    #[serde(default)]
    pub negative_prompts: BTreeMap<String, Fragment>,

    #[serde(default)]
    pub quality_enhancers: BTreeMap<String, Fragment>,

    #[serde(default)]
    pub available_samplers: Vec<String>,

    /// Optional categories (scene_backgrounds, clothing_accessories, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A template entry: a ready-made string or a list of tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
    Text(String),
    List(Vec<String>),
}

impl Fragment {
    /// Render as a comma-separated prompt fragment
    pub fn render(&self) -> String {
        match self {
            Fragment::Text(text) => text.clone(),
            Fragment::List(tags) => tags.join(", "),
        }
    }
}

// Defaults

fn default_endpoint() -> String {
    webui::client::DEFAULT_TXT2IMG_ENDPOINT.to_string()
}

fn default_timeout() -> f64 {
    300.0
}

fn default_options_timeout() -> f64 {
    30.0
}

fn default_serialize_generation() -> bool {
    true
}

fn default_size() -> u32 {
    512
}

fn default_steps() -> u32 {
    20
}

fn default_cfg_scale() -> f64 {
    7.5
}

fn default_sampler() -> String {
    "Euler a".to_string()
}

impl Default for DefaultParams {
    fn default() -> Self {
        Self {
            width: default_size(),
            height: default_size(),
            steps: default_steps(),
            cfg_scale: default_cfg_scale(),
            sampler_index: default_sampler(),
        }
    }
}

impl DefaultParams {
    /// Same range and sampler checks a request gets
    pub fn validate(&self) -> Result<(), ConfigError> {
        let out_of_range = |name: &str, value: String| {
            ConfigError::Invalid(format!("default_params.{name} out of range: {value}"))
        };
        if !DIMENSION_RANGE.contains(&self.width) {
            return Err(out_of_range("width", self.width.to_string()));
        }
        if !DIMENSION_RANGE.contains(&self.height) {
            return Err(out_of_range("height", self.height.to_string()));
        }
        if !STEPS_RANGE.contains(&self.steps) {
            return Err(out_of_range("steps", self.steps.to_string()));
        }
        if !CFG_SCALE_RANGE.contains(&self.cfg_scale) {
            return Err(out_of_range("cfg_scale", self.cfg_scale.to_string()));
        }
        if !SAMPLERS.contains(&self.sampler_index.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "default_params.sampler_index '{}' is not a supported sampler",
                self.sampler_index
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Minimal configuration; everything else takes its default
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_model: default_model.into(),
            endpoint: default_endpoint(),
            timeout: default_timeout(),
            options_timeout: default_options_timeout(),
            default_vae: None,
            default_params: DefaultParams::default(),
            prompt_suggestions: PromptSuggestions::default(),
            output_dir: None,
            transparency: TransparencyThresholds::default(),
            serialize_generation: default_serialize_generation(),
        }
    }

    /// Load configuration from a JSON or TOML file (chosen by extension)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            Self::from_toml_str(&contents)?
        } else {
            Self::from_json_str(&contents)?
        };
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::Invalid("default_model must not be empty".into()));
        }
        for (name, secs) in [("timeout", self.timeout), ("options_timeout", self.options_timeout)] {
            if !(secs > 0.0) || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number of seconds, got {secs}"
                )));
            }
        }
        self.default_params.validate()
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::MAX)
    }

    pub fn options_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.options_timeout).unwrap_or(Duration::MAX)
    }

    /// VAE from the configuration, ignoring blank values and `"None"`
    pub fn default_vae(&self) -> Option<&str> {
        self.default_vae
            .as_deref()
            .filter(|v| !v.trim().is_empty() && *v != "None")
    }

    /// Directory relative output paths are anchored to
    pub fn output_base_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(executable_dir)
    }
}

/// Directory containing the running executable, falling back to the working directory
pub fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

impl PromptSuggestions {
    pub fn character(&self, key: &str) -> Option<String> {
        self.character_prompts.get(key).map(Fragment::render)
    }

    pub fn style_modifier(&self, key: &str) -> Option<String> {
        self.style_modifiers.get(key).map(Fragment::render)
    }

    pub fn negative(&self, key: &str) -> Option<String> {
        self.negative_prompts.get(key).map(Fragment::render)
    }

    pub fn quality(&self, key: &str) -> Option<String> {
        self.quality_enhancers.get(key).map(Fragment::render)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "base_url": "http://127.0.0.1:7860",
        "endpoint": "/sdapi/v1/txt2img",
        "timeout": 600,
        "default_model": "anything-v5.safetensors",
        "default_vae": "None",
        "default_params": {"width": 768, "sampler_index": "DPM++ 2M"},
        "prompt_suggestions": {
            "character_prompts": {"anime_girl": "1girl, solo"},
            "quality_enhancers": {"high_quality": ["masterpiece", "best quality"]},
            "available_samplers": ["Euler a", "DDIM"],
            "scene_backgrounds": {"forest": "forest, trees"}
        }
    }"#;

    #[test]
    fn test_load_json() {
        let config = Config::from_json_str(JSON).unwrap();
        assert_eq!(config.timeout, 600.0);
        assert_eq!(config.default_params.width, 768);
        assert_eq!(config.default_params.height, 512);
        assert_eq!(config.default_params.sampler_index, "DPM++ 2M");
        assert_eq!(config.default_vae(), None);
        assert_eq!(
            config.prompt_suggestions.quality("high_quality").as_deref(),
            Some("masterpiece, best quality")
        );
        assert!(config.prompt_suggestions.extra.contains_key("scene_backgrounds"));
        assert!(config.serialize_generation);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
            base_url = "http://sd:7860"
            default_model = "realistic"
            output_dir = "/tmp/out"

            [transparency]
            white_floor = 240
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.endpoint, "/sdapi/v1/txt2img");
        assert_eq!(config.output_base_dir(), PathBuf::from("/tmp/out"));
        assert_eq!(config.transparency.white_floor, 240);
        assert_eq!(config.transparency.spread_max, 15);
    }

    #[test]
    fn test_missing_required_keys() {
        assert!(matches!(
            Config::from_json_str(r#"{"base_url": "http://x"}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            Config::from_json_str(r#"{"base_url": "http://x", "default_model": " "}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_default_params_rejected() {
        let bad_sampler = r#"{"base_url": "http://x", "default_model": "m",
            "default_params": {"sampler": "Nonexistent"}}"#;
        assert!(matches!(Config::from_json_str(bad_sampler), Err(ConfigError::Invalid(_))));

        let bad_width = r#"{"base_url": "http://x", "default_model": "m",
            "default_params": {"width": 4096}}"#;
        assert!(matches!(Config::from_json_str(bad_width), Err(ConfigError::Invalid(_))));

        let mut config = Config::new("http://x", "m");
        config.default_params.cfg_scale = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_timeout_rejected_without_panic() {
        let mut config = Config::new("http://x", "m");
        config.timeout = 1e300;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(config.generation_timeout(), Duration::MAX);

        config.timeout = 600.0;
        assert!(config.validate().is_ok());
        assert_eq!(config.generation_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_from_file_picks_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, JSON).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().default_model, "anything-v5.safetensors");

        let missing = dir.path().join("nope.json");
        assert!(matches!(Config::from_file(&missing), Err(ConfigError::Io { .. })));
    }
}
