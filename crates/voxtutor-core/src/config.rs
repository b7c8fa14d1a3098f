use crate::error::ConfigError;
use crate::types::Language;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub language: Language,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            language: Language::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_device_name")]
    pub output_device: String,

    #[serde(default = "default_device_name")]
    pub input_device: String,

    /// Rate of the shared output context and of every downstream chunk.
    #[serde(default = "default_playback_sample_rate")]
    pub playback_sample_rate: u32,

    /// Rate of microphone blocks sent upstream.
    #[serde(default = "default_capture_sample_rate")]
    pub capture_sample_rate: u32,

    /// Samples per upstream send.
    #[serde(default = "default_capture_block_size")]
    pub capture_block_size: usize,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,

    /// Max voices waiting to be picked up by the render callback.
    #[serde(default = "default_voice_capacity")]
    pub voice_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: default_device_name(),
            input_device: default_device_name(),
            playback_sample_rate: default_playback_sample_rate(),
            capture_sample_rate: default_capture_sample_rate(),
            capture_block_size: default_capture_block_size(),
            buffer_size: default_buffer_size(),
            voice_capacity: default_voice_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default)]
    pub gemini: Option<GeminiConfig>,

    #[serde(default)]
    pub null: Option<NullConfig>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            gemini: None,
            null: None,
        }
    }
}

impl BackendConfig {
    /// The option table handed to the selected engine's `initialize`.
    pub fn engine_options(&self) -> Result<toml::Value, ConfigError> {
        let value = match self.engine.as_str() {
            "gemini" => self.gemini.as_ref().map(toml::Value::try_from),
            "null" => self.null.as_ref().map(toml::Value::try_from),
            _ => None,
        };
        match value {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(ConfigError::Invalid(format!(
                "backend.{} options: {e}",
                self.engine
            ))),
            None => Ok(toml::Value::Table(Default::default())),
        }
    }
}

/// Options for the offline backend. Unset fields keep the backend defaults.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct NullConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_hz: Option<f64>,

    /// Answer every n-th microphone block in a live session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo_every: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_live_url")]
    pub live_url: String,

    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default = "default_test_model")]
    pub test_model: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_live_model")]
    pub live_model: String,

    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,

    #[serde(default = "default_live_voice")]
    pub live_voice: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_playback_sample_rate() -> u32 {
    24000
}

fn default_capture_sample_rate() -> u32 {
    16000
}

fn default_capture_block_size() -> usize {
    4096
}

fn default_buffer_size() -> u32 {
    1024
}

fn default_voice_capacity() -> usize {
    256
}

fn default_engine() -> String {
    "null".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_live_url() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_text_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_test_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_live_model() -> String {
    "gemini-2.5-flash-native-audio-preview-09-2025".to_string()
}

fn default_tts_voice() -> String {
    "Kore".to_string()
}

fn default_live_voice() -> String {
    "Zephyr".to_string()
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let mut result = input.to_string();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
        }
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if audio.playback_sample_rate == 0 || audio.capture_sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "sample rates must be greater than zero".to_string(),
            ));
        }
        if audio.capture_block_size == 0 {
            return Err(ConfigError::Invalid(
                "capture_block_size must be greater than zero".to_string(),
            ));
        }
        if audio.voice_capacity == 0 {
            return Err(ConfigError::Invalid(
                "voice_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
