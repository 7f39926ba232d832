use region_pilot_pipeline::display::{DisplayDevice, DisplayError};
use region_pilot_pipeline::engine::SegmentationEngine;
use region_pilot_pipeline::Pipeline;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::command::{Command, CommandInterpreter};
use crate::devices::{CaptureDevice, DeviceError, SpeechEngine, Utterance};
use crate::selection::{SelectionEvent, SelectionLog};
use crate::state::{NavigationError, Navigator, NavigatorSettings, Transition};

const SCENE_TITLE: &str = "Annotated Scene";
const OBJECT_TITLE: &str = "Current Object";
const FULL_TITLE: &str = "Full Scene";

/// Listen until the operator says something usable.
///
/// Unrecognized speech and utterances that are neither an action nor contain
/// a sentinel are retried without limit.
pub async fn next_command<S: SpeechEngine>(
    speech: &mut S,
    interpreter: &CommandInterpreter,
) -> Result<Command, DeviceError> {
    loop {
        let text = match speech.listen().await? {
            Utterance::Text(text) => text,
            Utterance::Unrecognized => {
                info!("Your input was not recognized.");
                continue;
            }
        };
        match interpreter.classify(&text).into_command() {
            Some(command) => {
                info!(heard = %text, ?command, "command recognized");
                return Ok(command);
            }
            None => info!(heard = %text, "That was not a valid option."),
        }
    }
}

/// Drives one navigator from bootstrap to sentinel.
pub struct Session<E, C, S, D> {
    pipeline: Pipeline<E>,
    capture: C,
    speech: S,
    display: D,
    interpreter: CommandInterpreter,
    settings: NavigatorSettings,
    selections: SelectionLog,
    selection_pause: Duration,
}

impl<E, C, S, D> Session<E, C, S, D>
where
    E: SegmentationEngine,
    C: CaptureDevice,
    S: SpeechEngine,
    D: DisplayDevice,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline: Pipeline<E>,
        capture: C,
        speech: S,
        display: D,
        interpreter: CommandInterpreter,
        settings: NavigatorSettings,
        selections: SelectionLog,
        selection_pause: Duration,
    ) -> Self {
        Self {
            pipeline,
            capture,
            speech,
            display,
            interpreter,
            settings,
            selections,
            selection_pause,
        }
    }

    /// Capture a scene and browse it until a sentinel is heard.
    /// Returns the sentinel word.
    pub async fn run(&mut self) -> Result<String, SessionError> {
        let mut navigator =
            Navigator::bootstrap(&self.pipeline, &mut self.capture, self.settings).await?;
        self.display.show(SCENE_TITLE, navigator.overview()).await?;

        loop {
            let view = navigator.current_view().map_err(NavigationError::from)?;
            if let Some(rect) = navigator.state().current() {
                let number = navigator.state().index() + 1;
                let total = navigator.state().proposals().len();
                info!(%rect, scope = navigator.scope().label(), "Displaying object #{number} of {total}");
            }
            self.display.show(OBJECT_TITLE, view.image()).await?;

            let action = match next_command(&mut self.speech, &self.interpreter).await? {
                Command::Sentinel(word) => {
                    navigator.terminate();
                    info!(word = %word, "sentinel heard, ending session");
                    return Ok(word);
                }
                Command::Action(action) => action,
            };

            match navigator
                .apply(action, &self.pipeline, &mut self.capture)
                .await
            {
                Ok(transition) => self.present(&navigator, transition).await?,
                Err(e) if e.is_configuration() => return Err(e.into()),
                Err(e) => error!(error = %e, %action, "action failed, keeping previous state"),
            }
        }
    }

    async fn present(
        &mut self,
        navigator: &Navigator,
        transition: Transition,
    ) -> Result<(), SessionError> {
        match transition {
            Transition::Moved { .. } | Transition::Focused { .. } => {}
            Transition::Wrapped => {
                info!("There are no more next objects; looping back to the start.")
            }
            Transition::NoPrevious => info!("There are no more previous objects."),
            Transition::Empty => info!("no region proposals in view"),
            Transition::Refreshed { .. } => {
                self.display.show(SCENE_TITLE, navigator.overview()).await?;
            }
            Transition::ShowOverview => {
                self.display.show(FULL_TITLE, navigator.overview()).await?;
            }
            Transition::Selected { index, rect, scope } => {
                let event = SelectionEvent::now(index, rect, scope);
                if let Err(e) = self.selections.record(&event).await {
                    warn!(error = %e, "failed to record selection");
                }
                tokio::time::sleep(self.selection_pause).await;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Display(#[from] DisplayError),
}

impl SessionError {
    /// The operator's input stream is gone and will not come back.
    pub fn is_input_closed(&self) -> bool {
        matches!(
            self,
            SessionError::Device(DeviceError::InputClosed(_))
                | SessionError::Display(DisplayError::InputClosed)
        )
    }

    /// Errors a restart cannot fix.
    pub fn is_fatal(&self) -> bool {
        match self {
            _ if self.is_input_closed() => true,
            SessionError::Navigation(e) => e.is_configuration(),
            SessionError::Device(e) => e.is_configuration(),
            SessionError::Display(_) => false,
        }
    }
}
