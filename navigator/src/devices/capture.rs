use region_pilot_common::config::CaptureConfig;
use region_pilot_common::frame::Frame;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::DeviceError;

/// A camera that yields one frame per call.
///
/// The device is opened, read once, and released before `acquire` returns,
/// whether or not the read succeeded.
#[allow(async_fn_in_trait)]
pub trait CaptureDevice {
    async fn acquire(&mut self) -> Result<Frame, DeviceError>;
}

/// Grabs a single frame from a video device through ffmpeg.
pub struct FfmpegCapture {
    device: String,
    input_format: String,
}

impl FfmpegCapture {
    pub fn new(device: impl Into<String>, input_format: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            input_format: input_format.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error"])
            .args(["-f", self.input_format.as_str(), "-i", self.device.as_str()])
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl CaptureDevice for FfmpegCapture {
    async fn acquire(&mut self) -> Result<Frame, DeviceError> {
        debug!(device = %self.device, format = %self.input_format, "capturing frame");
        let output = self.command().output().await.map_err(|e| DeviceError::Open {
            device: self.device.clone(),
            reason: format!("ffmpeg: {e}"),
        })?;

        if !output.status.success() {
            return Err(DeviceError::Read {
                device: self.device.clone(),
                reason: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Frame::decode(&output.stdout).map_err(|e| DeviceError::Read {
            device: self.device.clone(),
            reason: e.to_string(),
        })
    }
}

/// Serves the image stored at a path. Re-read on every acquire so the file
/// can be swapped between refreshes.
pub struct StillCapture {
    path: PathBuf,
}

impl StillCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CaptureDevice for StillCapture {
    async fn acquire(&mut self) -> Result<Frame, DeviceError> {
        let device = self.path.display().to_string();
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| DeviceError::Open {
                device: device.clone(),
                reason: e.to_string(),
            })?;
        Frame::decode(&bytes).map_err(|e| DeviceError::Read {
            device,
            reason: e.to_string(),
        })
    }
}

/// The capture device named by `[capture] source`.
pub enum CaptureSource {
    Ffmpeg(FfmpegCapture),
    Still(StillCapture),
}

impl CaptureSource {
    pub fn from_config(config: &CaptureConfig) -> Result<Self, DeviceError> {
        match config.source.as_str() {
            "ffmpeg" => Ok(Self::Ffmpeg(FfmpegCapture::new(
                &config.device,
                &config.input_format,
            ))),
            "still" => match &config.path {
                Some(path) => Ok(Self::Still(StillCapture::new(path))),
                None => Err(DeviceError::Config(
                    "capture source \"still\" requires capture.path".into(),
                )),
            },
            other => Err(DeviceError::Config(format!(
                "unknown capture source {other:?}, expected \"ffmpeg\" or \"still\""
            ))),
        }
    }
}

impl CaptureDevice for CaptureSource {
    async fn acquire(&mut self) -> Result<Frame, DeviceError> {
        match self {
            CaptureSource::Ffmpeg(c) => c.acquire().await,
            CaptureSource::Still(c) => c.acquire().await,
        }
    }
}
