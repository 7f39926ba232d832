use region_pilot_common::config::EngineConfig;
use region_pilot_common::frame::{Frame, FrameError};
use region_pilot_common::proposal::{ProposalError, ProposalSet};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Produces ranked region proposals for a frame.
///
/// The ranking is the engine's own business; callers only rely on the order
/// being meaningful. Engines always return the full set, large-box filtering
/// is done afterwards by [`crate::filter`].
#[allow(async_fn_in_trait)]
pub trait SegmentationEngine {
    async fn propose(&self, frame: &Frame, quality: bool) -> Result<ProposalSet, EngineError>;
}

/// Runs an external selective-search program once per frame.
///
/// The frame is written to the program's stdin as PNG and one `x,y,w,h` rect
/// is expected per stdout line, best first. The program receives
/// `--mode quality|fast --threads N` after the configured arguments.
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    threads: u32,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>, threads: u32) -> Self {
        Self {
            program: program.into(),
            args,
            threads,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.threads)
    }
}

impl SegmentationEngine for CommandEngine {
    async fn propose(&self, frame: &Frame, quality: bool) -> Result<ProposalSet, EngineError> {
        let png = frame.encode_png()?;
        let mode = if quality { "quality" } else { "fast" };
        let threads = self.threads.to_string();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(["--mode", mode, "--threads", threads.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("could not get stdin handle".into()))?;

        debug!(
            program = self.program,
            mode,
            width = frame.width(),
            height = frame.height(),
            "running segmentation engine"
        );

        // Feed stdin while draining stdout so a chatty engine cannot deadlock us.
        let feed = async move {
            let result = stdin.write_all(&png).await;
            drop(stdin);
            result
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| EngineError::Wait(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        fed.map_err(|e| EngineError::Write(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let proposals = ProposalSet::parse_lines(&stdout)?;
        Ok(retain_in_bounds(proposals, frame))
    }
}

/// Drop rects that do not lie inside `frame`, keeping the ranking order.
pub fn retain_in_bounds(proposals: ProposalSet, frame: &Frame) -> ProposalSet {
    let (width, height) = (frame.width(), frame.height());
    proposals
        .into_vec()
        .into_iter()
        .filter(|rect| {
            let fits = rect.fits_within(width, height);
            if !fits {
                warn!(%rect, width, height, "engine proposed a rect outside the frame, dropping");
            }
            fits
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn segmentation engine: {0}")]
    Spawn(String),
    #[error("failed to write frame to segmentation engine: {0}")]
    Write(String),
    #[error("failed to wait for segmentation engine: {0}")]
    Wait(String),
    #[error("segmentation engine failed: {0}")]
    Failed(String),
    #[error("segmentation engine output: {0}")]
    Malformed(#[from] ProposalError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use region_pilot_common::proposal::ProposalRect;

    #[test]
    fn out_of_bounds_rects_dropped_in_order() {
        let frame = Frame::filled(50, 40, [0, 0, 0]).unwrap();
        let proposals = ProposalSet::new(vec![
            ProposalRect::new(0, 0, 50, 40),
            ProposalRect::new(45, 0, 10, 10),
            ProposalRect::new(10, 10, 5, 5),
            ProposalRect::new(0, 35, 5, 6),
        ]);
        let kept = retain_in_bounds(proposals, &frame);
        assert_eq!(
            kept.as_slice(),
            &[ProposalRect::new(0, 0, 50, 40), ProposalRect::new(10, 10, 5, 5)]
        );
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let engine = CommandEngine::new("region-pilot-no-such-engine", Vec::new(), 1);
        let frame = Frame::filled(4, 4, [0, 0, 0]).unwrap();
        let err = engine.propose(&frame, true).await.unwrap_err();
        assert!(matches!(err, EngineError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_rects_from_program_stdout() {
        // `sh -c` ignores the trailing --mode/--threads positional args.
        let script = "cat > /dev/null; printf '0,0,4,4\\n1 1 2 2\\n9,9,9,9\\n'";
        let engine = CommandEngine::new("sh", vec!["-c".into(), script.into()], 1);
        let frame = Frame::filled(4, 4, [0, 0, 0]).unwrap();
        let proposals = engine.propose(&frame, false).await.unwrap();
        assert_eq!(
            proposals.as_slice(),
            &[ProposalRect::new(0, 0, 4, 4), ProposalRect::new(1, 1, 2, 2)]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn malformed_output_is_rejected() {
        let script = "cat > /dev/null; echo '1,2,3'";
        let engine = CommandEngine::new("sh", vec!["-c".into(), script.into()], 1);
        let frame = Frame::filled(4, 4, [0, 0, 0]).unwrap();
        let err = engine.propose(&frame, true).await.unwrap_err();
        assert!(matches!(err, EngineError::Malformed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let script = "cat > /dev/null; echo boom >&2; exit 3";
        let engine = CommandEngine::new("sh", vec!["-c".into(), script.into()], 1);
        let frame = Frame::filled(4, 4, [0, 0, 0]).unwrap();
        let err = engine.propose(&frame, true).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
