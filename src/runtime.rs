use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::session::{Recorder, SessionError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(String),
}

impl MouseButton {
    /// Human readable step description for a press of this button
    pub fn description(&self) -> String {
        match self {
            MouseButton::Left => "Left-click".to_string(),
            MouseButton::Right => "Right-click".to_string(),
            MouseButton::Middle => "Middle-click".to_string(),
            MouseButton::Other(name) => format!("Clicked {}", name),
        }
    }
}

/// Unified event type consumed by the runner. Only presses are surfaced;
/// releases never reach it.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// `x`/`y` are where the source saw the press; they are only logged.
    /// The overlay position comes from the capturer's `PointerLocator` at
    /// capture time.
    Press { button: MouseButton, x: f64, y: f64 },
    StopRequested,
}

/// Source of global input events
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError>;
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<InputEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<InputEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// One-shot flag that every stop trigger (hotkey, interrupt, explicit
/// request) converges on.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call any number of times from any thread.
    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !*stopped {
            *stopped = true;
            cvar.notify_all();
        }
    }

    pub fn is_triggered(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until triggered.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            stopped = cvar.wait(stopped).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// What a single runner step produced
#[derive(Clone, Debug, PartialEq)]
pub enum RunnerEvent {
    Input(InputEvent),
    Tick,
    Disconnected,
}

/// Runner that feeds events to a recorder one at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> RunnerEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => RunnerEvent::Input(ev),
            Err(RecvTimeoutError::Timeout) => RunnerEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => RunnerEvent::Disconnected,
        }
    }

    /// Routes presses into `recorder` until `stop` fires or the source goes away.
    pub fn run(&self, recorder: &Recorder, stop: &StopSignal) {
        while !stop.is_triggered() {
            match self.step() {
                RunnerEvent::Input(InputEvent::Press { button, x, y }) => {
                    debug!(?button, x, y, "button pressed");
                    recorder.add_step(&button.description());
                }
                RunnerEvent::Input(InputEvent::StopRequested) => {
                    info!("stop hotkey pressed");
                    stop.trigger();
                }
                RunnerEvent::Tick => {}
                RunnerEvent::Disconnected => {
                    warn!("input event source disconnected");
                    break;
                }
            }
        }
    }

    /// Runs on a background thread. The stop signal fires when the runner
    /// exits for any reason, so a dead event source ends the session.
    pub fn spawn(self, recorder: Arc<Recorder>, stop: StopSignal) -> JoinHandle<()> {
        thread::spawn(move || {
            self.run(&recorder, &stop);
            stop.trigger();
        })
    }
}

/// Records until `stop` fires, then finalizes the session exactly once.
pub fn run_session<E: EventSource, T: Ticker>(
    recorder: Arc<Recorder>,
    runner: Runner<E, T>,
    stop: StopSignal,
) -> Result<Option<PathBuf>, SessionError> {
    let handle = runner.spawn(Arc::clone(&recorder), stop.clone());
    stop.wait();
    info!("stopping, please wait while the report is generated");

    let result = recorder.stop();
    if handle.join().is_err() {
        warn!("event runner panicked");
    }
    result
}
