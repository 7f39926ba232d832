use chrono::{DateTime, Utc};
use region_pilot_common::config::SelectionConfig;
use region_pilot_common::proposal::ProposalRect;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::state::Scope;

/// One "go for this object" decision handed to the arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionEvent {
    pub index: usize,
    pub rect: ProposalRect,
    pub scope: Scope,
    pub selected_at: DateTime<Utc>,
}

impl SelectionEvent {
    pub fn now(index: usize, rect: ProposalRect, scope: Scope) -> Self {
        Self {
            index,
            rect,
            scope,
            selected_at: Utc::now(),
        }
    }
}

/// Where selection events go: always the log, plus an optional JSON-lines file.
pub struct SelectionLog {
    path: Option<PathBuf>,
}

impl SelectionLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(config.log_path.as_ref().map(PathBuf::from))
    }

    pub async fn record(&self, event: &SelectionEvent) -> Result<(), SelectionError> {
        info!(
            index = event.index,
            rect = %event.rect,
            scope = ?event.scope,
            "Selected object #{}",
            event.index
        );

        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| SelectionError::Io(path.display().to_string(), e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| SelectionError::Io(path.display().to_string(), e))?;
        file.flush()
            .await
            .map_err(|e| SelectionError::Io(path.display().to_string(), e))?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("failed to write selection log {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to serialize selection event: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_flat_rect_and_lowercase_scope() {
        let event = SelectionEvent::now(3, ProposalRect::new(1, 2, 30, 40), Scope::Focused);
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["index"], 3);
        assert_eq!(value["rect"]["w"], 30);
        assert_eq!(value["scope"], "focused");
        assert!(value["selected_at"].is_string());
    }

    #[tokio::test]
    async fn appends_one_json_line_per_event() {
        let path = std::env::temp_dir().join(format!(
            "region-pilot-selections-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let log = SelectionLog::new(Some(path.clone()));

        log.record(&SelectionEvent::now(0, ProposalRect::new(0, 0, 5, 5), Scope::Browsing))
            .await
            .unwrap();
        log.record(&SelectionEvent::now(1, ProposalRect::new(1, 1, 6, 6), Scope::Focused))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["index"], 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn without_path_only_logs() {
        let log = SelectionLog::new(None);
        log.record(&SelectionEvent::now(0, ProposalRect::new(0, 0, 1, 1), Scope::Browsing))
            .await
            .unwrap();
    }
}
