use std::collections::HashSet;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use image::RgbaImage;
use steprec::capture::{CaptureError, PointerLocator, ScreenGrabber};
use steprec::config::{ImageFormat, SessionConfig};
use steprec::session::Recorder;

// A slow grabber widens the window in which unserialized code would interleave.
fn slow_grabber() -> Box<dyn ScreenGrabber> {
    Box::new(|| -> Result<RgbaImage, CaptureError> {
        thread::sleep(Duration::from_millis(2));
        Ok(RgbaImage::new(2, 2))
    })
}

fn no_pointer() -> Box<dyn PointerLocator> {
    Box::new(|| -> Option<(f64, f64)> { None })
}

fn counter_of(filename: &str) -> u64 {
    let stem = filename.rsplit_once('.').unwrap().0;
    stem.rsplit_once("_step_").unwrap().1.parse().unwrap()
}

#[test]
fn concurrent_presses_get_unique_increasing_counters() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = SessionConfig::new(dir.path().join("C.html"), None, ImageFormat::Png, 80).unwrap();
    let recorder = Arc::new(Recorder::new(cfg, slow_grabber(), no_pointer()).unwrap());

    let threads = 8;
    let per_thread = 5;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let recorder = Arc::clone(&recorder);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    assert!(recorder.add_step(&format!("thread {} press {}", t, i)));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let steps = recorder.steps();
    assert_eq!(steps.len(), threads * per_thread);
    assert_eq!(recorder.screenshot_counter(), (threads * per_thread) as u64);

    let counters: Vec<u64> = steps
        .iter()
        .map(|s| counter_of(s.image_filename.as_deref().unwrap()))
        .collect();
    let expected: Vec<u64> = (0..(threads * per_thread) as u64).collect();
    assert_eq!(counters, expected, "ledger order must match counter issuance");

    let names: HashSet<_> = steps.iter().map(|s| s.image_filename.clone()).collect();
    assert_eq!(names.len(), steps.len());
    assert!(steps.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn stop_racing_with_presses_freezes_the_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("Race.html");
    let cfg = SessionConfig::new(out.clone(), None, ImageFormat::Png, 80).unwrap();
    let recorder = Arc::new(Recorder::new(cfg, slow_grabber(), no_pointer()).unwrap());

    let presser = {
        let recorder = Arc::clone(&recorder);
        thread::spawn(move || {
            let mut accepted = 0usize;
            for i in 0..200 {
                if recorder.add_step(&format!("press {}", i)) {
                    accepted += 1;
                }
            }
            accepted
        })
    };

    thread::sleep(Duration::from_millis(20));
    let saved = recorder.stop().unwrap();
    let accepted = presser.join().unwrap();

    assert!(saved.is_some());
    assert_eq!(recorder.step_count(), accepted);

    // every admitted step made it into the report and nothing else did
    let html = fs::read_to_string(&out).unwrap();
    assert_eq!(html.matches(r#"<li class="step-card">"#).count(), accepted);
    assert_eq!(html.matches("<img").count(), accepted);
    assert!(!recorder.add_step("late press"));
    assert_eq!(recorder.step_count(), accepted);
}

#[test]
fn concurrent_stops_build_one_report() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = SessionConfig::new(dir.path().join("Once.html"), None, ImageFormat::Png, 80).unwrap();
    let recorder = Arc::new(Recorder::new(cfg, slow_grabber(), no_pointer()).unwrap());
    recorder.add_step("Left-click");

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let recorder = Arc::clone(&recorder);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                recorder.stop().unwrap().is_some()
            })
        })
        .collect();
    let builds = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|built| *built)
        .count();
    assert_eq!(builds, 1);
}
