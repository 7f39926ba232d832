use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

use crate::proposal::ProposalRect;

/// An RGB camera frame with both dimensions at least 1.
///
/// Frames are never mutated in place. Cropping and resizing always produce a
/// new, independently owned frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Result<Self, FrameError> {
        let (width, height) = image.dimensions();
        if width < 1 || height < 1 {
            return Err(FrameError::InvalidFrame { width, height });
        }
        Ok(Self { image })
    }

    /// A frame filled with a single color. Handy for placeholders and tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, FrameError> {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn from_dynamic(image: DynamicImage) -> Result<Self, FrameError> {
        Self::new(image.to_rgb8())
    }

    /// Decode an encoded image (PNG, JPEG, ...) with format auto-detection.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let image =
            image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
        Self::from_dynamic(image)
    }

    pub fn open(path: &Path) -> Result<Self, FrameError> {
        let image = image::open(path)
            .map_err(|e| FrameError::Decode(format!("{}: {e}", path.display())))?;
        Self::from_dynamic(image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Copy the pixels under `rect` into a new frame.
    pub fn crop(&self, rect: &ProposalRect) -> Result<Frame, FrameError> {
        if !rect.fits_within(self.width(), self.height()) {
            return Err(FrameError::CropOutOfBounds {
                rect: *rect,
                width: self.width(),
                height: self.height(),
            });
        }
        let sub = image::imageops::crop_imm(&self.image, rect.x, rect.y, rect.w, rect.h);
        Frame::new(sub.to_image())
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, FrameError> {
        let mut buffer = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| FrameError::Encode(e.to_string()))?;
        Ok(buffer.into_inner())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame: dimensions {width}x{height} must both be at least 1")]
    InvalidFrame { width: u32, height: u32 },
    #[error("invalid frame: {rect} does not fit inside {width}x{height}")]
    CropOutOfBounds {
        rect: ProposalRect,
        width: u32,
        height: u32,
    },
    #[error("invalid frame: failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode frame: {0}")]
    Encode(String),
}
