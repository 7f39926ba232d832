use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Length of the longer side after normalization.
    #[serde(default = "default_upper_bound")]
    pub upper_bound: u32,
    /// Minimum fraction of the frame area a large proposal must exceed.
    #[serde(default = "default_lbb_ratio")]
    pub lbb_ratio: f64,
    /// Mode string in `(f|q)[l]` form for top-level runs.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Mode string used when re-segmenting a focused region.
    #[serde(default = "default_mode")]
    pub focus_mode: String,
    #[serde(default)]
    pub focus_resize: bool,
    #[serde(default = "default_max_display_rects")]
    pub max_display_rects: usize,
    #[serde(default = "default_display_increment")]
    pub display_increment: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_engine_threads")]
    pub threads: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// `ffmpeg` for a live camera, `still` for an image file on disk.
    #[serde(default = "default_capture_source")]
    pub source: String,
    #[serde(default = "default_capture_device")]
    pub device: String,
    #[serde(default = "default_input_format")]
    pub input_format: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// `command` runs an external recognizer, `console` reads typed lines.
    #[serde(default = "default_speech_source")]
    pub source: String,
    #[serde(default = "default_speech_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_bell")]
    pub bell: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub viewer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    /// Extra words per action name. Canonical names are always accepted.
    #[serde(default = "default_synonyms")]
    pub synonyms: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_sentinels")]
    pub sentinels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub log_path: Option<String>,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upper_bound: default_upper_bound(),
            lbb_ratio: default_lbb_ratio(),
            mode: default_mode(),
            focus_mode: default_mode(),
            focus_resize: false,
            max_display_rects: default_max_display_rects(),
            display_increment: default_display_increment(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_engine_program(),
            args: Vec::new(),
            threads: default_engine_threads(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: default_capture_source(),
            device: default_capture_device(),
            input_format: default_input_format(),
            path: None,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            source: default_speech_source(),
            program: default_speech_program(),
            args: Vec::new(),
            bell: default_bell(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            viewer: None,
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            synonyms: default_synonyms(),
            sentinels: default_sentinels(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            pause_ms: default_pause_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    /// Like [`Config::load`], but a missing file yields the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.upper_bound == 0 {
            return Err(ConfigError::Invalid("pipeline.upper_bound must be positive".into()));
        }
        if !(p.lbb_ratio > 0.0 && p.lbb_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.lbb_ratio must be in (0, 1], got {}",
                p.lbb_ratio
            )));
        }
        if p.max_display_rects == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_display_rects must be positive".into(),
            ));
        }
        if p.display_increment == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.display_increment must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// Default value functions
fn default_upper_bound() -> u32 {
    500
}
fn default_lbb_ratio() -> f64 {
    1.0 / 32.0
}
fn default_mode() -> String {
    "ql".into()
}
fn default_max_display_rects() -> usize {
    100
}
fn default_display_increment() -> usize {
    50
}
fn default_engine_program() -> String {
    "ssearch-propose".into()
}
fn default_engine_threads() -> u32 {
    4
}
fn default_capture_source() -> String {
    "ffmpeg".into()
}
fn default_capture_device() -> String {
    "/dev/video0".into()
}
fn default_input_format() -> String {
    "v4l2".into()
}
fn default_speech_source() -> String {
    "command".into()
}
fn default_speech_program() -> String {
    "transcribe-once".into()
}
fn default_bell() -> bool {
    true
}
fn default_output_dir() -> String {
    "frames/".into()
}
fn default_synonyms() -> BTreeMap<String, Vec<String>> {
    [
        ("next", "no"),
        ("previous", "last"),
        ("focus", "zoom"),
        ("refresh", "new"),
        ("select", "yes"),
        ("full", "big"),
    ]
    .into_iter()
    .map(|(action, word)| (action.to_string(), vec![word.to_string()]))
    .collect()
}
fn default_sentinels() -> Vec<String> {
    ["stop", "end", "quit", "off", "exit"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_pause_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "info".into()
}
