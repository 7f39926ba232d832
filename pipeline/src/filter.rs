use region_pilot_common::proposal::ProposalSet;
use tracing::info;

/// Default minimum fraction of the frame area for a large bounding box.
pub const LBB_RATIO: f64 = 1.0 / 32.0;

/// Post-filter applied to the engine's ranked proposals.
///
/// Implementations must return a subsequence of the input in the same order.
pub trait ProposalFilter: Send + Sync {
    fn apply(&self, proposals: &ProposalSet, frame_width: u32, frame_height: u32) -> ProposalSet;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Keeps proposals whose area strictly exceeds `ratio` of the frame area.
#[derive(Debug, Clone, Copy)]
pub struct LargeRegionFilter {
    ratio: f64,
}

impl LargeRegionFilter {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }
}

impl Default for LargeRegionFilter {
    fn default() -> Self {
        Self::new(LBB_RATIO)
    }
}

impl ProposalFilter for LargeRegionFilter {
    fn apply(&self, proposals: &ProposalSet, frame_width: u32, frame_height: u32) -> ProposalSet {
        filter_large(proposals, frame_width, frame_height, self.ratio)
    }

    fn name(&self) -> &str {
        "large"
    }
}

/// Returns the proposals untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ProposalFilter for PassThrough {
    fn apply(&self, proposals: &ProposalSet, _frame_width: u32, _frame_height: u32) -> ProposalSet {
        let kept = proposals.clone();
        info!(count = kept.len(), filter = "all", "region proposals");
        kept
    }

    fn name(&self) -> &str {
        "all"
    }
}

/// Keep every rect with `w * h > frame_width * frame_height * ratio`.
pub fn filter_large(
    proposals: &ProposalSet,
    frame_width: u32,
    frame_height: u32,
    ratio: f64,
) -> ProposalSet {
    let threshold = frame_width as f64 * frame_height as f64 * ratio;
    let kept: ProposalSet = proposals
        .iter()
        .filter(|rect| rect.area() as f64 > threshold)
        .copied()
        .collect();
    info!(
        count = kept.len(),
        dropped = proposals.len() - kept.len(),
        threshold,
        filter = "large",
        "region proposals"
    );
    kept
}
