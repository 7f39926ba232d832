mod command;
mod devices;
mod selection;
mod session;
mod state;

use region_pilot_common::config::Config;
use region_pilot_pipeline::console::Console;
use region_pilot_pipeline::display::FileDisplay;
use region_pilot_pipeline::engine::CommandEngine;
use region_pilot_pipeline::Pipeline;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use command::CommandInterpreter;
use devices::{CaptureSource, SpeechSource};
use selection::SelectionLog;
use session::Session;
use state::NavigatorSettings;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load_or_default(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        config = %config_path.display(),
        mode = %config.pipeline.mode,
        capture = %config.capture.source,
        speech = %config.speech.source,
        "starting region navigator"
    );

    let interpreter = match CommandInterpreter::from_config(&config.commands) {
        Ok(i) => i,
        Err(e) => fatal("invalid command table", &e),
    };
    info!(sentinels = ?interpreter.sentinels(), "command table ready");
    let settings = match NavigatorSettings::from_config(&config.pipeline) {
        Ok(s) => s,
        Err(e) => fatal("invalid pipeline settings", &e),
    };
    let capture = match CaptureSource::from_config(&config.capture) {
        Ok(c) => c,
        Err(e) => fatal("invalid capture settings", &e),
    };

    let console = Console::stdin();
    let speech = match SpeechSource::from_config(&config.speech, console.clone()) {
        Ok(s) => s,
        Err(e) => fatal("invalid speech settings", &e),
    };

    let mut session = Session::new(
        Pipeline::new(
            CommandEngine::from_config(&config.engine),
            (&config.pipeline).into(),
        ),
        capture,
        speech,
        FileDisplay::from_config(&config.display, console),
        interpreter,
        settings,
        SelectionLog::from_config(&config.selection),
        Duration::from_millis(config.selection.pause_ms),
    );

    // Restart the whole session on device trouble.
    let mut backoff = Duration::from_secs(2);
    let max_backoff = Duration::from_secs(30);
    loop {
        match session.run().await {
            Ok(word) => {
                info!(word = %word, "session ended");
                return;
            }
            Err(e) if e.is_input_closed() => {
                info!(error = %e, "operator input closed, ending session");
                return;
            }
            Err(e) if e.is_fatal() => fatal("session failed", &e),
            Err(e) => {
                error!(error = %e, "session error, restarting in {:?}", backoff);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

fn fatal(context: &str, e: &dyn std::error::Error) -> ! {
    error!(error = %e, "{context}");
    std::process::exit(1);
}
