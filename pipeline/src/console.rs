use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Line-oriented operator input shared by every component that reads stdin.
///
/// A single buffered reader sits behind the handle so typed-ahead lines are
/// never lost between readers.
#[derive(Clone)]
pub struct Console {
    lines: Arc<Mutex<Lines<BufReader<Stdin>>>>,
}

impl Console {
    pub fn stdin() -> Self {
        Self {
            lines: Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines())),
        }
    }

    /// Print `message` to stderr and wait for the next line.
    /// Returns `None` once stdin is closed.
    pub async fn prompt(&self, message: &str) -> io::Result<Option<String>> {
        eprintln!("{message}");
        self.lines.lock().await.next_line().await
    }
}
