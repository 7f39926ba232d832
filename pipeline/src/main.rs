use region_pilot_common::config::Config;
use region_pilot_common::frame::Frame;
use region_pilot_pipeline::annotate::annotate;
use region_pilot_pipeline::console::Console;
use region_pilot_pipeline::display::{DisplayDevice, FileDisplay};
use region_pilot_pipeline::engine::CommandEngine;
use region_pilot_pipeline::mode::Mode;
use region_pilot_pipeline::{Pipeline, Processed, RunSettings};
use std::path::PathBuf;
use tracing::{error, info};

const USAGE: &str = "\
Usage:
    region-pilot-ssearch <input_image> (f|q)[l] [config.toml]
    f=fast, q=quality
    l=large bounding boxes
When displaying the image:
Use \"l\" to display fewer rects, \"m\" to display more rects, \"q\" to quit.";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let (image_path, mode, config_path) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };

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

    info!(image = %image_path.display(), %mode, "starting selective search");

    let frame = match Frame::open(&image_path) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "failed to load input image");
            std::process::exit(1);
        }
    };

    let pipeline = Pipeline::new(
        CommandEngine::from_config(&config.engine),
        (&config.pipeline).into(),
    );
    let processed = match pipeline.process(frame, RunSettings::new(mode, true)).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "selective search failed");
            std::process::exit(1);
        }
    };

    println!("Total Number of Region Proposals: {}", processed.proposals.len());
    for rect in &processed.proposals {
        println!("{},{},{},{}", rect.x, rect.y, rect.w, rect.h);
    }

    let mut display = FileDisplay::from_config(&config.display, Console::stdin());
    let start = config.pipeline.max_display_rects;
    let increment = config.pipeline.display_increment;
    if let Err(e) = browse(&mut display, &processed, start, increment).await {
        error!(error = %e, "display failed");
        std::process::exit(1);
    }
}

/// `<image> <mode> [config]`, or the usage text to print on any mistake.
fn parse_args(args: &[String]) -> Result<(PathBuf, Mode, PathBuf), String> {
    if !(3..=4).contains(&args.len()) {
        return Err(USAGE.to_string());
    }
    let mode: Mode = args[2].parse().map_err(|e| format!("{e}\n\n{USAGE}"))?;
    let config_path = args
        .get(3)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    Ok((PathBuf::from(&args[1]), mode, config_path))
}

/// Interactive overlay: keep redrawing until the operator presses `q`.
async fn browse<D: DisplayDevice>(
    display: &mut D,
    processed: &Processed,
    start: usize,
    increment: usize,
) -> Result<(), region_pilot_pipeline::display::DisplayError> {
    let mut shown = start;
    loop {
        let overlay = annotate(&processed.frame, &processed.proposals, shown);
        let key = display.show("Output", &overlay).await?;
        match adjust_shown(shown, key, increment) {
            Some(next) => shown = next,
            None => return Ok(()),
        }
    }
}

/// New rect count after `key`, or `None` when the operator quits.
fn adjust_shown(shown: usize, key: u8, increment: usize) -> Option<usize> {
    match key {
        b'm' => Some(shown + increment),
        b'l' if shown > increment => Some(shown - increment),
        b'q' => None,
        _ => Some(shown),
    }
}
