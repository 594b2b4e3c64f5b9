//! Desktop collaborators: global input hooks through `rdev` and screen
//! capture through `xcap`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use image::RgbaImage;
use rdev::{Button, EventType, Key};
use tracing::error;
use xcap::Monitor;

use crate::capture::{CaptureError, PointerLocator, ScreenGrabber};
use crate::runtime::{EventSource, InputEvent, MouseButton};

/// Last pointer position seen by the global listener.
#[derive(Clone, Debug, Default)]
pub struct SharedPointer(Arc<Mutex<Option<(f64, f64)>>>);

impl SharedPointer {
    fn set(&self, x: f64, y: f64) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some((x, y));
    }
}

impl PointerLocator for SharedPointer {
    fn position(&self) -> Option<(f64, f64)> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Grabs the monitor containing the origin, which is the primary one.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopGrabber;

impl ScreenGrabber for DesktopGrabber {
    fn grab(&self) -> Result<RgbaImage, CaptureError> {
        let monitor = Monitor::from_point(0, 0).map_err(|e| CaptureError::Grab(e.to_string()))?;
        monitor
            .capture_image()
            .map_err(|e| CaptureError::Grab(e.to_string()))
    }
}

fn map_button(button: Button) -> MouseButton {
    match button {
        Button::Left => MouseButton::Left,
        Button::Right => MouseButton::Right,
        Button::Middle => MouseButton::Middle,
        Button::Unknown(n) => MouseButton::Other(format!("Button {}", n)),
    }
}

/// Ctrl+Esc or Cmd+Esc, pressed anywhere.
#[derive(Debug, Default)]
struct StopHotkey {
    ctrl: bool,
    meta: bool,
}

impl StopHotkey {
    /// Tracks modifier state; returns true when the combination completes.
    fn update(&mut self, event: &EventType) -> bool {
        match event {
            EventType::KeyPress(Key::ControlLeft | Key::ControlRight) => self.ctrl = true,
            EventType::KeyRelease(Key::ControlLeft | Key::ControlRight) => self.ctrl = false,
            EventType::KeyPress(Key::MetaLeft | Key::MetaRight) => self.meta = true,
            EventType::KeyRelease(Key::MetaLeft | Key::MetaRight) => self.meta = false,
            EventType::KeyPress(Key::Escape) => return self.ctrl || self.meta,
            _ => {}
        }
        false
    }
}

/// Event source backed by an OS-wide `rdev` listener thread.
pub struct DesktopEventSource {
    rx: Receiver<InputEvent>,
    pointer: SharedPointer,
}

impl DesktopEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let pointer = SharedPointer::default();
        let shared = pointer.clone();

        std::thread::spawn(move || {
            let mut hotkey = StopHotkey::default();
            if let Err(e) = rdev::listen(move |event| forward(&tx, &shared, &mut hotkey, event.event_type)) {
                error!(error = ?e, "global input listener failed");
            }
        });

        Self { rx, pointer }
    }

    /// Locator fed by this source's pointer tracking.
    pub fn pointer(&self) -> SharedPointer {
        self.pointer.clone()
    }
}

impl Default for DesktopEventSource {
    fn default() -> Self {
        Self::new()
    }
}

fn forward(tx: &Sender<InputEvent>, pointer: &SharedPointer, hotkey: &mut StopHotkey, event: EventType) {
    if hotkey.update(&event) {
        let _ = tx.send(InputEvent::StopRequested);
        return;
    }
    match event {
        EventType::MouseMove { x, y } => pointer.set(x, y),
        EventType::ButtonPress(button) => {
            let (x, y) = pointer.position().unwrap_or_default();
            let _ = tx.send(InputEvent::Press {
                button: map_button(button),
                x,
                y,
            });
        }
        _ => {}
    }
}

impl EventSource for DesktopEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<InputEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}
