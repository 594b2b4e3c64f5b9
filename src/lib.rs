// Library surface for the binary and for headless integration tests.
// Desktop hooks stay behind the `desktop` feature so the core builds anywhere.
pub mod app_dirs;
pub mod capture;
pub mod config;
#[cfg(feature = "desktop")]
pub mod platform;
pub mod report;
pub mod runtime;
pub mod session;

pub use config::{ImageFormat, SessionConfig};
pub use session::{RecordedStep, Recorder, RecorderState};
