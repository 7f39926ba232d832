use region_pilot_common::config::SpeechConfig;
use region_pilot_pipeline::console::Console;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::DeviceError;

/// What one listening attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    Text(String),
    /// Something was heard but could not be turned into text.
    Unrecognized,
}

/// A microphone plus recognizer that captures a single utterance per call.
#[allow(async_fn_in_trait)]
pub trait SpeechEngine {
    async fn listen(&mut self) -> Result<Utterance, DeviceError>;
}

/// Runs an external transcriber once per utterance and reads the text it
/// prints on stdout. A failing run counts as unrecognized speech.
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    bell: bool,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>, bell: bool) -> Self {
        Self {
            program: program.into(),
            args,
            bell,
        }
    }
}

impl SpeechEngine for CommandSpeech {
    async fn listen(&mut self) -> Result<Utterance, DeviceError> {
        if self.bell {
            eprintln!("Listening for command!\x07");
        } else {
            eprintln!("Listening for command!");
        }

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DeviceError::Open {
                device: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            debug!(
                program = %self.program,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "transcriber did not recognize speech"
            );
            return Ok(Utterance::Unrecognized);
        }

        Ok(utterance_from(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Typed commands on the shared console, for running without a microphone.
pub struct ConsoleSpeech {
    console: Console,
}

impl ConsoleSpeech {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl SpeechEngine for ConsoleSpeech {
    async fn listen(&mut self) -> Result<Utterance, DeviceError> {
        let line = self
            .console
            .prompt("Type a command:")
            .await
            .map_err(|e| DeviceError::Read {
                device: "stdin".into(),
                reason: e.to_string(),
            })?
            .ok_or(DeviceError::InputClosed("console"))?;
        Ok(utterance_from(&line))
    }
}

fn utterance_from(text: &str) -> Utterance {
    let text = text.trim();
    if text.is_empty() {
        Utterance::Unrecognized
    } else {
        Utterance::Text(text.to_string())
    }
}

/// The speech engine named by `[speech] source`.
pub enum SpeechSource {
    Command(CommandSpeech),
    Console(ConsoleSpeech),
}

impl SpeechSource {
    pub fn from_config(config: &SpeechConfig, console: Console) -> Result<Self, DeviceError> {
        match config.source.as_str() {
            "command" => Ok(Self::Command(CommandSpeech::new(
                &config.program,
                config.args.clone(),
                config.bell,
            ))),
            "console" => Ok(Self::Console(ConsoleSpeech::new(console))),
            other => Err(DeviceError::Config(format!(
                "unknown speech source {other:?}, expected \"command\" or \"console\""
            ))),
        }
    }
}

impl SpeechEngine for SpeechSource {
    async fn listen(&mut self) -> Result<Utterance, DeviceError> {
        match self {
            SpeechSource::Command(s) => s.listen().await,
            SpeechSource::Console(s) => s.listen().await,
        }
    }
}
