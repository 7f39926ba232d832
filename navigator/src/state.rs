use image::RgbImage;
use region_pilot_common::config::PipelineConfig;
use region_pilot_common::frame::{Frame, FrameError};
use region_pilot_common::proposal::{ProposalRect, ProposalSet};
use region_pilot_pipeline::annotate::annotate;
use region_pilot_pipeline::engine::SegmentationEngine;
use region_pilot_pipeline::{Pipeline, PipelineError, Processed, RunSettings};
use serde::Serialize;
use tracing::{debug, info};

use crate::command::Action;
use crate::devices::{CaptureDevice, DeviceError};

/// How the navigator runs the pipeline for a whole scene and for a focused
/// sub-region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigatorSettings {
    pub scene: RunSettings,
    pub focus: RunSettings,
    /// Rect budget for the annotated overview.
    pub max_display_rects: usize,
}

impl NavigatorSettings {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            scene: RunSettings::parse(&config.mode, true)?,
            focus: RunSettings::parse(&config.focus_mode, config.focus_resize)?,
            max_display_rects: config.max_display_rects,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Proposals of a freshly captured scene.
    Browsing,
    /// Proposals found inside one proposal of a previous state.
    Focused,
}

impl Scope {
    /// Upper-case name used in transition logs.
    pub fn label(self) -> &'static str {
        match self {
            Scope::Browsing => "BROWSING",
            Scope::Focused => "FOCUSED",
        }
    }
}

/// The frame being browsed, its proposals, and the cursor into them.
#[derive(Debug, Clone)]
pub struct NavigationState {
    frame: Frame,
    proposals: ProposalSet,
    index: usize,
}

impl NavigationState {
    fn start(processed: Processed) -> Self {
        Self {
            frame: processed.frame,
            proposals: processed.proposals,
            index: 0,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn proposals(&self) -> &ProposalSet {
        &self.proposals
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The proposal under the cursor, if there are any.
    pub fn current(&self) -> Option<&ProposalRect> {
        self.proposals.get(self.index)
    }
}

/// What a single action did, for the driver to render and log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Moved { index: usize },
    /// Next ran past the last proposal and the cursor is back at 0.
    Wrapped,
    NoPrevious,
    /// Nothing to act on: the current state has no proposals.
    Empty,
    Focused { proposals: usize },
    Refreshed { proposals: usize },
    Selected {
        index: usize,
        rect: ProposalRect,
        scope: Scope,
    },
    ShowOverview,
}

/// Voice-driven browsing over region proposals.
///
/// Owned by the session driver and mutated one action at a time. Focus and
/// Refresh build their replacement state completely before swapping it in, so
/// a failed pipeline run or capture leaves the previous state untouched.
pub struct Navigator {
    state: NavigationState,
    scope: Scope,
    /// Annotated frame of the last top-level capture; Full always shows this.
    overview: RgbImage,
    settings: NavigatorSettings,
    terminated: bool,
}

impl Navigator {
    /// Capture a first frame and build the initial Browsing state from it.
    pub async fn bootstrap<E, C>(
        pipeline: &Pipeline<E>,
        capture: &mut C,
        settings: NavigatorSettings,
    ) -> Result<Self, NavigationError>
    where
        E: SegmentationEngine,
        C: CaptureDevice,
    {
        let processed = scene(pipeline, capture, settings).await?;
        info!(
            proposals = processed.proposals.len(),
            width = processed.frame.width(),
            height = processed.frame.height(),
            "navigator ready"
        );
        Ok(Self::from_scene(processed, settings))
    }

    pub fn from_scene(processed: Processed, settings: NavigatorSettings) -> Self {
        let overview = annotate(
            &processed.frame,
            &processed.proposals,
            settings.max_display_rects,
        );
        Self {
            state: NavigationState::start(processed),
            scope: Scope::Browsing,
            overview,
            settings,
            terminated: false,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn overview(&self) -> &RgbImage {
        &self.overview
    }

    /// The image to put in front of the operator: a crop of the proposal under
    /// the cursor, or the whole frame when there are no proposals.
    pub fn current_view(&self) -> Result<Frame, FrameError> {
        match self.state.current() {
            Some(rect) => self.state.frame().crop(rect),
            None => Ok(self.state.frame().clone()),
        }
    }

    /// Apply one action. Rejected with [`NavigationError::Terminated`] once a
    /// sentinel has ended the session.
    pub async fn apply<E, C>(
        &mut self,
        action: Action,
        pipeline: &Pipeline<E>,
        capture: &mut C,
    ) -> Result<Transition, NavigationError>
    where
        E: SegmentationEngine,
        C: CaptureDevice,
    {
        if self.terminated {
            return Err(NavigationError::Terminated);
        }
        let transition = match action {
            Action::Next => self.next(),
            Action::Previous => self.previous(),
            Action::Focus => self.focus(pipeline).await?,
            Action::Refresh => self.refresh(pipeline, capture).await?,
            Action::Select => self.select(),
            Action::Full => Transition::ShowOverview,
        };
        debug!(%action, ?transition, index = self.state.index, "action applied");
        Ok(transition)
    }

    /// Mark the session over.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    fn next(&mut self) -> Transition {
        let len = self.state.proposals.len();
        if len == 0 {
            return Transition::Empty;
        }
        let next = self.state.index + 1;
        if next >= len {
            self.state.index = 0;
            Transition::Wrapped
        } else {
            self.state.index = next;
            Transition::Moved { index: next }
        }
    }

    fn previous(&mut self) -> Transition {
        if self.state.proposals.is_empty() {
            return Transition::Empty;
        }
        if self.state.index == 0 {
            return Transition::NoPrevious;
        }
        self.state.index -= 1;
        Transition::Moved {
            index: self.state.index,
        }
    }

    fn select(&self) -> Transition {
        match self.state.current() {
            Some(&rect) => Transition::Selected {
                index: self.state.index,
                rect,
                scope: self.scope,
            },
            None => Transition::Empty,
        }
    }

    async fn focus<E: SegmentationEngine>(
        &mut self,
        pipeline: &Pipeline<E>,
    ) -> Result<Transition, NavigationError> {
        let Some(rect) = self.state.current().copied() else {
            return Ok(Transition::Empty);
        };
        let region = self.state.frame.crop(&rect)?;
        let processed = pipeline.process(region, self.settings.focus).await?;
        let proposals = processed.proposals.len();

        info!(%rect, proposals, "{}→FOCUSED: analyzing current view as new scene", self.scope.label());
        self.state = NavigationState::start(processed);
        self.scope = Scope::Focused;
        Ok(Transition::Focused { proposals })
    }

    async fn refresh<E, C>(
        &mut self,
        pipeline: &Pipeline<E>,
        capture: &mut C,
    ) -> Result<Transition, NavigationError>
    where
        E: SegmentationEngine,
        C: CaptureDevice,
    {
        let processed = scene(pipeline, capture, self.settings).await?;
        let proposals = processed.proposals.len();

        info!(proposals, "{}→BROWSING: refreshed scene", self.scope.label());
        self.overview = annotate(
            &processed.frame,
            &processed.proposals,
            self.settings.max_display_rects,
        );
        self.state = NavigationState::start(processed);
        self.scope = Scope::Browsing;
        Ok(Transition::Refreshed { proposals })
    }
}

async fn scene<E, C>(
    pipeline: &Pipeline<E>,
    capture: &mut C,
    settings: NavigatorSettings,
) -> Result<Processed, NavigationError>
where
    E: SegmentationEngine,
    C: CaptureDevice,
{
    let frame = capture.acquire().await?;
    Ok(pipeline.process(frame, settings.scene).await?)
}

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("navigation session already terminated")]
    Terminated,
}

impl NavigationError {
    pub fn is_configuration(&self) -> bool {
        match self {
            NavigationError::Pipeline(e) => e.is_configuration(),
            NavigationError::Device(e) => e.is_configuration(),
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use region_pilot_pipeline::engine::EngineError;
    use region_pilot_pipeline::PipelineSettings;
    use std::cell::Cell;
    use std::collections::VecDeque;

    /// Proposes the whole frame and its top-left quarter.
    #[derive(Default)]
    pub(crate) struct QuarterEngine {
        pub(crate) fail: Cell<bool>,
    }

    impl SegmentationEngine for QuarterEngine {
        async fn propose(&self, frame: &Frame, _quality: bool) -> Result<ProposalSet, EngineError> {
            if self.fail.get() {
                return Err(EngineError::Failed("engine down".into()));
            }
            let (w, h) = (frame.width(), frame.height());
            let mut rects = vec![ProposalRect::new(0, 0, w, h)];
            if w >= 2 && h >= 2 {
                rects.push(ProposalRect::new(0, 0, w / 2, h / 2));
            }
            Ok(ProposalSet::new(rects))
        }
    }

    /// Hands out queued frames; an empty queue behaves like an unplugged camera.
    #[derive(Default)]
    pub(crate) struct QueuedCapture {
        pub(crate) frames: VecDeque<Frame>,
    }

    impl QueuedCapture {
        pub(crate) fn with(frames: impl IntoIterator<Item = Frame>) -> Self {
            Self {
                frames: frames.into_iter().collect(),
            }
        }
    }

    impl CaptureDevice for QueuedCapture {
        async fn acquire(&mut self) -> Result<Frame, DeviceError> {
            self.frames.pop_front().ok_or_else(|| DeviceError::Open {
                device: "queued".into(),
                reason: "no frames left".into(),
            })
        }
    }

    pub(crate) fn settings() -> NavigatorSettings {
        NavigatorSettings::from_config(&PipelineConfig::default()).unwrap()
    }

    pub(crate) fn pipeline() -> Pipeline<QuarterEngine> {
        Pipeline::new(QuarterEngine::default(), PipelineSettings::default())
    }

    fn navigator_with(rects: Vec<ProposalRect>) -> Navigator {
        let processed = Processed {
            frame: Frame::filled(100, 100, [0, 0, 0]).unwrap(),
            proposals: ProposalSet::new(rects),
        };
        Navigator::from_scene(processed, settings())
    }

    #[test]
    fn scope_labels_are_upper_case() {
        assert_eq!(Scope::Browsing.label(), "BROWSING");
        assert_eq!(Scope::Focused.label(), "FOCUSED");
    }

    #[test]
    fn next_wraps_and_previous_stops_at_zero() {
        let mut nav = navigator_with(vec![
            ProposalRect::new(0, 0, 10, 10),
            ProposalRect::new(0, 0, 50, 50),
        ]);
        assert_eq!(nav.next(), Transition::Moved { index: 1 });
        assert_eq!(nav.next(), Transition::Wrapped);
        assert_eq!(nav.state().index(), 0);
        assert_eq!(nav.previous(), Transition::NoPrevious);
        assert_eq!(nav.state().index(), 0);
    }

    #[test]
    fn empty_state_is_inert() {
        let mut nav = navigator_with(Vec::new());
        assert_eq!(nav.next(), Transition::Empty);
        assert_eq!(nav.previous(), Transition::Empty);
        assert_eq!(nav.select(), Transition::Empty);
        assert_eq!(nav.state().index(), 0);
        // whole frame stands in for the missing crop
        assert_eq!(nav.current_view().unwrap().width(), 100);
    }

    #[test]
    fn select_reports_current_rect() {
        let mut nav = navigator_with(vec![
            ProposalRect::new(0, 0, 10, 10),
            ProposalRect::new(5, 5, 20, 30),
        ]);
        nav.next();
        assert_eq!(
            nav.select(),
            Transition::Selected {
                index: 1,
                rect: ProposalRect::new(5, 5, 20, 30),
                scope: Scope::Browsing,
            }
        );
        assert_eq!(nav.state().index(), 1);
        let view = nav.current_view().unwrap();
        assert_eq!((view.width(), view.height()), (20, 30));
    }

    #[tokio::test]
    async fn bootstrap_normalizes_and_filters() {
        let pipeline = pipeline();
        let mut capture = QueuedCapture::with([Frame::filled(1000, 800, [0, 0, 0]).unwrap()]);

        let nav = Navigator::bootstrap(&pipeline, &mut capture, settings())
            .await
            .unwrap();

        assert_eq!(nav.scope(), Scope::Browsing);
        assert_eq!(nav.state().frame().width(), 500);
        assert_eq!(nav.state().proposals().len(), 2);
        assert_eq!(nav.overview().dimensions(), (500, 400));
    }

    #[tokio::test]
    async fn focus_then_refresh_returns_to_fresh_scene() {
        let pipeline = pipeline();
        let mut capture = QueuedCapture::with([
            Frame::filled(200, 100, [0, 0, 0]).unwrap(),
            // already at the bound, so pixels pass through untouched
            Frame::filled(500, 250, [9, 9, 9]).unwrap(),
        ]);
        let mut nav = Navigator::bootstrap(&pipeline, &mut capture, settings())
            .await
            .unwrap();
        let overview = nav.overview().clone();

        nav.apply(Action::Next, &pipeline, &mut capture).await.unwrap();
        let focused = nav.apply(Action::Focus, &pipeline, &mut capture).await.unwrap();
        assert_eq!(focused, Transition::Focused { proposals: 2 });
        assert_eq!(nav.scope(), Scope::Focused);
        assert_eq!(nav.state().index(), 0);
        // quarter of the 500x250 normalized scene, not normalized again
        assert_eq!(nav.state().frame().width(), 250);

        let full = nav.apply(Action::Full, &pipeline, &mut capture).await.unwrap();
        assert_eq!(full, Transition::ShowOverview);
        assert_eq!(nav.overview(), &overview);

        let refreshed = nav.apply(Action::Refresh, &pipeline, &mut capture).await.unwrap();
        assert_eq!(refreshed, Transition::Refreshed { proposals: 2 });
        assert_eq!(nav.scope(), Scope::Browsing);
        assert_eq!(nav.state().index(), 0);
        assert_eq!(nav.state().frame().image().get_pixel(0, 0).0, [9, 9, 9]);
        assert_ne!(nav.overview(), &overview);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_state() {
        let pipeline = pipeline();
        let mut capture = QueuedCapture::with([Frame::filled(100, 100, [0, 0, 0]).unwrap()]);
        let mut nav = Navigator::bootstrap(&pipeline, &mut capture, settings())
            .await
            .unwrap();
        nav.apply(Action::Next, &pipeline, &mut capture).await.unwrap();

        let err = nav
            .apply(Action::Refresh, &pipeline, &mut capture)
            .await
            .unwrap_err();
        assert!(matches!(err, NavigationError::Device(_)));
        assert_eq!(nav.state().index(), 1);
        assert_eq!(nav.scope(), Scope::Browsing);
    }

    #[tokio::test]
    async fn failed_focus_keeps_previous_state() {
        let pipeline = pipeline();
        let mut capture = QueuedCapture::with([Frame::filled(100, 100, [0, 0, 0]).unwrap()]);
        let mut nav = Navigator::bootstrap(&pipeline, &mut capture, settings())
            .await
            .unwrap();
        pipeline.engine().fail.set(true);

        let err = nav
            .apply(Action::Focus, &pipeline, &mut capture)
            .await
            .unwrap_err();
        assert!(matches!(err, NavigationError::Pipeline(_)));
        assert!(!err.is_configuration());
        assert_eq!(nav.scope(), Scope::Browsing);
        assert_eq!(nav.state().frame().width(), 500);
    }

    #[tokio::test]
    async fn terminated_navigator_rejects_actions() {
        let pipeline = pipeline();
        let mut capture = QueuedCapture::default();
        let mut nav = navigator_with(vec![ProposalRect::new(0, 0, 10, 10)]);
        nav.terminate();

        let err = nav
            .apply(Action::Next, &pipeline, &mut capture)
            .await
            .unwrap_err();
        assert!(matches!(err, NavigationError::Terminated));
    }

    proptest! {
        #[test]
        fn cursor_stays_in_bounds(
            len in 0usize..8,
            moves in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let rects = (0..len as u32).map(|i| ProposalRect::new(i, i, 10, 10)).collect();
            let mut nav = navigator_with(rects);
            for forward in moves {
                if forward {
                    nav.next();
                } else {
                    nav.previous();
                }
                prop_assert!(nav.state().index() < len.max(1));
            }
        }
    }
}
