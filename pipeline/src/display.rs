use chrono::Utc;
use image::{ImageFormat, RgbImage};
use region_pilot_common::config::DisplayConfig;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::console::Console;

/// Somewhere to put an image in front of the operator.
#[allow(async_fn_in_trait)]
pub trait DisplayDevice {
    /// Show `image` under `title` and block until a key is struck.
    /// Returns the key code.
    async fn show(&mut self, title: &str, image: &RgbImage) -> Result<u8, DisplayError>;
}

/// Writes each shown image to a timestamped PNG, optionally opens it in an
/// external viewer, and waits for a line on the console.
///
/// Only the newest file per title is kept on disk; the previous one is removed
/// once its replacement is written. The viewer process only lives for the
/// duration of one `show` call.
pub struct FileDisplay {
    output_dir: PathBuf,
    viewer: Option<String>,
    console: Console,
    written: HashMap<String, PathBuf>,
}

impl FileDisplay {
    pub fn new(output_dir: impl Into<PathBuf>, viewer: Option<String>, console: Console) -> Self {
        Self {
            output_dir: output_dir.into(),
            viewer,
            console,
            written: HashMap::new(),
        }
    }

    pub fn from_config(config: &DisplayConfig, console: Console) -> Self {
        Self::new(&config.output_dir, config.viewer.clone(), console)
    }

    async fn write_png(&mut self, title: &str, image: &RgbImage) -> Result<PathBuf, DisplayError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| DisplayError::Io(self.output_dir.display().to_string(), e))?;

        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| DisplayError::Encode(e.to_string()))?;

        let path = self.output_dir.join(image_file_name(title));
        tokio::fs::write(&path, buffer.into_inner())
            .await
            .map_err(|e| DisplayError::Io(path.display().to_string(), e))?;

        if let Some(previous) = self.written.insert(title.to_string(), path.clone()) {
            if previous != path {
                if let Err(e) = tokio::fs::remove_file(&previous).await {
                    warn!(path = %previous.display(), error = %e, "failed to remove old display image");
                }
            }
        }
        Ok(path)
    }
}

impl DisplayDevice for FileDisplay {
    async fn show(&mut self, title: &str, image: &RgbImage) -> Result<u8, DisplayError> {
        let path = self.write_png(title, image).await?;
        info!(title, path = %path.display(), "displaying image");

        // Killed on drop, i.e. when this call returns on any path.
        let _viewer = match &self.viewer {
            Some(program) => Some(spawn_viewer(program, &path)?),
            None => None,
        };

        let message = format!(
            "[{title}] {} ({}x{}). Press a key then Enter to continue.",
            path.display(),
            image.width(),
            image.height()
        );
        let line = self
            .console
            .prompt(&message)
            .await
            .map_err(|e| DisplayError::Io("stdin".into(), e))?
            .ok_or(DisplayError::InputClosed)?;

        let key = key_code(&line);
        debug!(title, key, "key received");
        Ok(key)
    }
}

fn spawn_viewer(program: &str, path: &Path) -> Result<tokio::process::Child, DisplayError> {
    Command::new(program)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DisplayError::Viewer(format!("{program}: {e}")))
}

/// First byte of the typed line, or newline when the operator just hit Enter.
pub fn key_code(line: &str) -> u8 {
    line.trim().bytes().next().unwrap_or(b'\n')
}

/// `<slug>_<UTC timestamp>.png`, e.g. `annotated_scene_20260218T093000123Z.png`.
fn image_file_name(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let ts = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    format!("{slug}_{ts}.png")
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display I/O failed for {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to encode image for display: {0}")]
    Encode(String),
    #[error("failed to start image viewer: {0}")]
    Viewer(String),
    #[error("display input closed")]
    InputClosed,
}
