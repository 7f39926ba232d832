//! Region proposal pipeline: normalize a frame, ask the segmentation engine
//! for ranked proposals, then optionally keep only the large ones.

pub mod annotate;
pub mod console;
pub mod display;
pub mod engine;
pub mod filter;
pub mod mode;
pub mod normalize;

use region_pilot_common::config::PipelineConfig;
use region_pilot_common::frame::{Frame, FrameError};
use region_pilot_common::proposal::ProposalSet;
use tracing::debug;

use engine::{EngineError, SegmentationEngine};
use filter::{LargeRegionFilter, PassThrough, ProposalFilter};
use mode::{Mode, ModeError};

/// Settings shared by every run of a [`Pipeline`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub upper_bound: u32,
    pub lbb_ratio: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            upper_bound: normalize::UPPER_BOUND,
            lbb_ratio: filter::LBB_RATIO,
        }
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            upper_bound: config.upper_bound,
            lbb_ratio: config.lbb_ratio,
        }
    }
}

/// Per-run knobs: which search to use and whether to bound the frame first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub mode: Mode,
    pub resize: bool,
}

impl RunSettings {
    pub const fn new(mode: Mode, resize: bool) -> Self {
        Self { mode, resize }
    }

    pub fn parse(mode: &str, resize: bool) -> Result<Self, PipelineError> {
        Ok(Self::new(mode.parse()?, resize))
    }
}

/// A frame and the proposals that refer to it.
#[derive(Debug, Clone)]
pub struct Processed {
    pub frame: Frame,
    pub proposals: ProposalSet,
}

pub struct Pipeline<E> {
    engine: E,
    settings: PipelineSettings,
}

impl<E: SegmentationEngine> Pipeline<E> {
    pub fn new(engine: E, settings: PipelineSettings) -> Self {
        Self { engine, settings }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Normalize (when asked), segment, and filter one frame.
    pub async fn process(&self, frame: Frame, run: RunSettings) -> Result<Processed, PipelineError> {
        let frame = if run.resize {
            normalize::normalize(&frame, self.settings.upper_bound)?
        } else {
            frame
        };

        let proposals = self.engine.propose(&frame, run.mode.quality).await?;
        let filter: Box<dyn ProposalFilter> = if run.mode.large {
            Box::new(LargeRegionFilter::new(self.settings.lbb_ratio))
        } else {
            Box::new(PassThrough)
        };
        let proposals = filter.apply(&proposals, frame.width(), frame.height());

        debug!(
            mode = %run.mode,
            filter = filter.name(),
            width = frame.width(),
            height = frame.height(),
            count = proposals.len(),
            "pipeline run complete"
        );
        Ok(Processed { frame, proposals })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid configuration: {0}")]
    Mode(#[from] ModeError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl PipelineError {
    /// True for errors caused by bad input or settings rather than a failing
    /// collaborator; retrying them cannot help.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidConfiguration(_)
                | PipelineError::Mode(_)
                | PipelineError::Engine(EngineError::Malformed(_))
        )
    }
}
