use image::imageops::FilterType;
use region_pilot_common::frame::{Frame, FrameError};
use tracing::debug;

use crate::PipelineError;

/// Default length of the longer side after normalization.
pub const UPPER_BOUND: u32 = 500;

/// Target `(width, height)` for a frame whose longer side becomes `upper_bound`.
///
/// Portrait frames pin the height, everything else (including squares) pins
/// the width. The other side is floored, but never below 1.
pub fn target_dimensions(width: u32, height: u32, upper_bound: u32) -> (u32, u32) {
    let scaled = |side: u32, long: u32| -> u32 {
        let value = side as u64 * upper_bound as u64 / long as u64;
        value.clamp(1, upper_bound as u64) as u32
    };
    if height > width {
        (scaled(width, height), upper_bound)
    } else {
        (upper_bound, scaled(height, width))
    }
}

/// Rescale `frame` so its longer side equals `upper_bound`, preserving the
/// aspect ratio up to integer flooring.
pub fn normalize(frame: &Frame, upper_bound: u32) -> Result<Frame, PipelineError> {
    if upper_bound == 0 {
        return Err(PipelineError::InvalidConfiguration(
            "upper bound must be positive".into(),
        ));
    }
    let (width, height) = (frame.width(), frame.height());
    if width < 1 || height < 1 {
        return Err(FrameError::InvalidFrame { width, height }.into());
    }

    let (new_width, new_height) = target_dimensions(width, height, upper_bound);
    if (new_width, new_height) == (width, height) {
        debug!(width, height, "frame already normalized");
        return Ok(frame.clone());
    }

    debug!(width, height, new_width, new_height, "resizing frame");
    let resized = image::imageops::resize(frame.image(), new_width, new_height, FilterType::Triangle);
    Ok(Frame::new(resized)?)
}
