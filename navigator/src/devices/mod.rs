pub mod capture;
pub mod speech;

pub use capture::{CaptureDevice, CaptureSource};
pub use speech::{SpeechEngine, SpeechSource, Utterance};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to open {device}: {reason}")]
    Open { device: String, reason: String },
    #[error("failed to read from {device}: {reason}")]
    Read { device: String, reason: String },
    #[error("{0} input closed")]
    InputClosed(&'static str),
    #[error("invalid device configuration: {0}")]
    Config(String),
}

impl DeviceError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, DeviceError::Config(_))
    }
}
