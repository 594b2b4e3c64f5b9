use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use steprec::config::{Config, ConfigStore, FileConfigStore, ImageFormat, SessionConfig};
use steprec::platform::{DesktopEventSource, DesktopGrabber};
use steprec::runtime::{run_session, FixedTicker, Runner, StopSignal};
use steprec::session::Recorder;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TICK_RATE_MS: u64 = 100;

/// record clicks as screenshots and compile them into one html report
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Listens for mouse clicks anywhere on the desktop, takes a screenshot with a cursor overlay on every press, and writes the numbered steps with inlined images to a single html file. Stop with Ctrl+Esc (Cmd+Esc on macOS) or Ctrl+C."
)]
pub struct Cli {
    /// where to write the html report
    #[clap(short = 'o', long)]
    outfile: Option<PathBuf>,

    /// image pasted onto each screenshot at the pointer position
    #[clap(short = 'c', long)]
    cursor: Option<PathBuf>,

    /// record without a cursor overlay
    #[clap(long, conflicts_with = "cursor")]
    no_cursor: bool,

    /// save screenshots as lossless png instead of jpeg
    #[clap(long)]
    png: bool,

    /// save screenshots as jpeg, overriding a saved png default
    #[clap(long, conflicts_with = "png")]
    jpeg: bool,

    /// jpeg compression quality (1-100), ignored for png
    #[clap(short = 'q', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// remember these settings as the defaults for future runs
    #[clap(long)]
    save_config: bool,

    /// more log output (-v debug, -vv trace)
    #[clap(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Overlay command line flags on the persisted defaults
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(outfile) = &self.outfile {
            cfg.outfile = outfile.clone();
        }
        if self.no_cursor {
            cfg.cursor = None;
        } else if let Some(cursor) = &self.cursor {
            cfg.cursor = Some(cursor.clone());
        }
        if self.png {
            cfg.format = ImageFormat::Png;
        } else if self.jpeg {
            cfg.format = ImageFormat::Jpeg;
        }
        if let Some(quality) = self.quality {
            cfg.quality = quality;
        }
        cfg
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = FileConfigStore::new();
    let cfg = cli.apply(store.load());
    if cli.save_config {
        store
            .save(&cfg)
            .with_context(|| format!("failed to save config to {}", store.path().display()))?;
        info!(path = %store.path().display(), "saved default settings");
    }

    let session_config = SessionConfig::try_from(&cfg)?;
    let outfile = session_config.outfile().to_path_buf();

    let source = DesktopEventSource::new();
    let recorder = Arc::new(Recorder::new(
        session_config,
        Box::new(DesktopGrabber),
        Box::new(source.pointer()),
    )?);

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.trigger()).context("failed to install interrupt handler")?;
    }

    println!("Recording to {}", outfile.display());
    if !recorder.has_cursor() {
        println!("No cursor overlay, screenshots show the bare screen.");
    }
    println!("Press Ctrl+Esc or Cmd+Esc ANYWHERE to stop capturing.");

    let runner = Runner::new(source, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    if let Some(path) = run_session(recorder, runner, stop)? {
        println!("Saved to: {}", path.display());
    }

    Ok(())
}
