use crate::capture::{Capturer, PointerLocator, ScreenGrabber};
use crate::config::SessionConfig;
use crate::report::{ReportBuilder, ReportError};
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create screenshot directory: {0}")]
    TempDir(#[source] io::Error),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// One user action in the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStep {
    pub description: String,
    pub image_filename: Option<String>,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Recording,
    Stopped,
}

// Everything the lock guards. `temp_dir` is taken exactly once, on stop.
struct SessionState {
    state: RecorderState,
    steps: Vec<RecordedStep>,
    screenshot_counter: u64,
    temp_dir: Option<TempDir>,
    capturer: Capturer,
}

/// A recording session. All mutation goes through `add_step` and `stop`,
/// which share one lock.
pub struct Recorder {
    config: SessionConfig,
    image_dir: PathBuf,
    inner: Mutex<SessionState>,
}

impl Recorder {
    pub fn new(
        config: SessionConfig,
        grabber: Box<dyn ScreenGrabber>,
        locator: Box<dyn PointerLocator>,
    ) -> Result<Self, SessionError> {
        let temp_dir = tempfile::Builder::new()
            .prefix("steprec-")
            .tempdir()
            .map_err(SessionError::TempDir)?;
        let image_dir = temp_dir.path().to_path_buf();
        let capturer = Capturer::new(&config, image_dir.clone(), grabber, locator);

        info!(
            outfile = %config.outfile().display(),
            format = %config.format(),
            screenshots = %image_dir.display(),
            "recording session started"
        );

        Ok(Self {
            config,
            image_dir,
            inner: Mutex::new(SessionState {
                state: RecorderState::Recording,
                steps: Vec::new(),
                screenshot_counter: 0,
                temp_dir: Some(temp_dir),
                capturer,
            }),
        })
    }

    // every update is a single push or assignment; poisoning is recovered
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Captures a screenshot and records a step. Returns `false` without
    /// touching anything once the session has stopped.
    pub fn add_step(&self, description: &str) -> bool {
        let mut guard = self.lock();
        if guard.state != RecorderState::Recording {
            debug!(description, "session stopped, ignoring step");
            return false;
        }

        let inner = &mut *guard;
        let image_filename = inner.capturer.capture(&mut inner.screenshot_counter);
        inner.steps.push(RecordedStep {
            description: description.to_string(),
            image_filename,
            timestamp: Local::now(),
        });
        debug!(step = inner.steps.len(), description, "step recorded");
        true
    }

    /// Stops recording, writes the report and removes the screenshot
    /// directory. Only the first call does anything; later calls return
    /// `Ok(None)`.
    pub fn stop(&self) -> Result<Option<PathBuf>, SessionError> {
        let (steps, temp_dir) = {
            let mut guard = self.lock();
            if guard.state == RecorderState::Stopped {
                return Ok(None);
            }
            guard.state = RecorderState::Stopped;
            (guard.steps.clone(), guard.temp_dir.take())
        };

        info!(steps = steps.len(), "recording stopped");

        let report = ReportBuilder::new(
            self.config.title(),
            self.config.outfile(),
            &steps,
            &self.image_dir,
            self.config.format(),
        )
        .build();

        if let Some(dir) = temp_dir {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), error = %e, "failed to remove screenshot directory");
            }
        }

        Ok(Some(report?))
    }

    pub fn state(&self) -> RecorderState {
        self.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    pub fn step_count(&self) -> usize {
        self.lock().steps.len()
    }

    /// Snapshot of the recorded steps.
    pub fn steps(&self) -> Vec<RecordedStep> {
        self.lock().steps.clone()
    }

    pub fn screenshot_counter(&self) -> u64 {
        self.lock().screenshot_counter
    }

    pub fn has_cursor(&self) -> bool {
        self.lock().capturer.has_cursor()
    }

    /// Where screenshots live until the session stops.
    pub fn temp_dir(&self) -> &Path {
        &self.image_dir
    }
}
