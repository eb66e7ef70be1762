//! Startup flow: recognize when faces are enrolled, otherwise offer enrollment.

use crate::capture::{CaptureController, CaptureError};
use crate::devices::{Devices, FrameSource, Preview, WINDOW_TITLE};
use crate::overlay::{Overlay, TextSize, GREEN};
use crate::prompt::NamePrompt;
use crate::recognize::{RecognitionController, RecognitionReport, RecognizeError};
use facecam_core::{train, DatasetError, DatasetStore, FaceDetector, FaceRecognizer, LabelMap, TrainError, TrainedModel};
use facecam_hw::{CameraError, DisplayError, KeyInput};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Capture(CaptureError),
    #[error(transparent)]
    Train(TrainError),
    #[error(transparent)]
    Recognize(RecognizeError),
    #[error("display error: {0}")]
    Display(#[from] DisplayError),
    #[error("failed to read identity name: {0}")]
    Prompt(#[from] std::io::Error),
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Recognition ran with a freshly trained model.
    Recognized { labels: LabelMap, report: RecognitionReport },
    /// No readable samples; recognition never started.
    TrainingFailed,
    /// The identity name was already enrolled.
    EnrollmentRejected(String),
    /// Escape or window close at the enrollment prompt.
    Cancelled,
    /// The camera stopped delivering frames at the enrollment prompt.
    StreamEnded,
    CameraUnavailable,
}

enum Phase<R> {
    Idle,
    HasIdentities,
    NoIdentities,
    Enroll(String),
    Train,
    Recognize(TrainedModel<R>),
    Done(Outcome),
}

pub struct Orchestrator<'a, D, V, P> {
    store: &'a DatasetStore,
    detector: &'a mut D,
    overlay: &'a Overlay,
    devices: &'a V,
    prompt: P,
}

impl<'a, D, V, P> Orchestrator<'a, D, V, P>
where
    D: FaceDetector,
    V: Devices,
    P: NamePrompt,
{
    pub fn new(store: &'a DatasetStore, detector: &'a mut D, overlay: &'a Overlay, devices: &'a V, prompt: P) -> Self {
        Self {
            store,
            detector,
            overlay,
            devices,
            prompt,
        }
    }

    /// Full startup flow.
    pub fn run<R: FaceRecognizer + Default>(&mut self) -> Result<Outcome, OrchestratorError> {
        self.drive::<R>(Phase::Idle)
    }

    /// Enroll `name` directly, then train and recognize.
    pub fn enroll<R: FaceRecognizer + Default>(&mut self, name: &str) -> Result<Outcome, OrchestratorError> {
        self.drive::<R>(Phase::Enroll(name.trim().to_string()))
    }

    /// Train on the current store and recognize.
    pub fn recognize<R: FaceRecognizer + Default>(&mut self) -> Result<Outcome, OrchestratorError> {
        self.drive::<R>(Phase::Train)
    }

    fn drive<R: FaceRecognizer + Default>(&mut self, mut phase: Phase<R>) -> Result<Outcome, OrchestratorError> {
        loop {
            phase = match phase {
                Phase::Idle => {
                    if self.store.has_identities()? {
                        Phase::HasIdentities
                    } else {
                        Phase::NoIdentities
                    }
                }
                Phase::HasIdentities => {
                    println!("Faces already enrolled. Training model...");
                    Phase::Train
                }
                Phase::NoIdentities => self.await_enroll()?,
                Phase::Enroll(name) => self.enroll_phase(&name)?,
                Phase::Train => self.train_phase()?,
                Phase::Recognize(model) => self.recognize_phase(model)?,
                Phase::Done(outcome) => {
                    tracing::debug!(?outcome, "orchestrator finished");
                    return Ok(outcome);
                }
            };
        }
    }

    /// Live preview with the enroll hint until `C`, Escape or a failed read.
    fn await_enroll<R>(&mut self) -> Result<Phase<R>, OrchestratorError> {
        let mut camera = match self.devices.open_camera() {
            Ok(camera) => camera,
            Err(e) => return Ok(camera_unavailable(e)),
        };
        let mut preview = self.devices.open_preview(WINDOW_TITLE);
        println!("No faces enrolled. Press C to enroll.");

        let enroll = loop {
            let frame = match camera.read() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(error = %e, "camera read failed at enrollment prompt");
                    return Ok(Phase::Done(Outcome::StreamEnded));
                }
            };
            let mut image = frame.image;
            self.overlay
                .draw_text(&mut image, "Press C to enroll your face", 10, 20, TextSize::Prompt, GREEN);
            preview.show(&image)?;

            match preview.poll_key() {
                KeyInput::Enroll => break true,
                KeyInput::Cancel => break false,
                KeyInput::None => {}
            }
        };

        drop(preview);
        drop(camera);

        if !enroll {
            tracing::info!("enrollment cancelled");
            return Ok(Phase::Done(Outcome::Cancelled));
        }
        let name = self.prompt.ask_name()?;
        Ok(Phase::Enroll(name))
    }

    fn enroll_phase<R>(&mut self, name: &str) -> Result<Phase<R>, OrchestratorError> {
        let mut controller = CaptureController::new(self.store, &mut *self.detector, self.overlay);
        match controller.capture(self.devices, name) {
            Ok(report) => {
                println!("Captured {} samples for {name:?}.", report.saved);
                tracing::debug!(frames = report.frames, stop = ?report.stop, "enrollment capture done");
                Ok(Phase::Train)
            }
            Err(CaptureError::AlreadyEnrolled(name)) => {
                eprintln!("Error: identity {name:?} is already enrolled.");
                Ok(Phase::Done(Outcome::EnrollmentRejected(name)))
            }
            Err(CaptureError::Dataset(DatasetError::InvalidName(name))) => {
                eprintln!("Error: invalid identity name {name:?}.");
                Ok(Phase::Done(Outcome::EnrollmentRejected(name)))
            }
            Err(CaptureError::Camera(e)) => Ok(camera_unavailable(e)),
            Err(e) => Err(OrchestratorError::Capture(e)),
        }
    }

    fn train_phase<R: FaceRecognizer + Default>(&mut self) -> Result<Phase<R>, OrchestratorError> {
        println!("Training model...");
        match train(self.store, R::default()) {
            Ok(model) => {
                println!("Model trained successfully.");
                Ok(Phase::Recognize(model))
            }
            Err(TrainError::NoSamples(dir)) => {
                eprintln!("Error: no valid images found in {}.", dir.display());
                Ok(Phase::Done(Outcome::TrainingFailed))
            }
            Err(e) => Err(OrchestratorError::Train(e)),
        }
    }

    fn recognize_phase<R: FaceRecognizer>(&mut self, model: TrainedModel<R>) -> Result<Phase<R>, OrchestratorError> {
        let mut controller = RecognitionController::new(&mut *self.detector, &model, self.overlay);
        match controller.run(self.devices) {
            Ok(report) => Ok(Phase::Done(Outcome::Recognized {
                labels: model.labels,
                report,
            })),
            Err(RecognizeError::Camera(e)) => Ok(camera_unavailable(e)),
            Err(e) => Err(OrchestratorError::Recognize(e)),
        }
    }
}

fn camera_unavailable<R>(e: CameraError) -> Phase<R> {
    eprintln!("Error: could not open camera: {e}");
    Phase::Done(Outcome::CameraUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::fake::{Event, FakeDevices, Log, Phase as Script, StubDetector};
    use crate::devices::Stop;
    use crate::prompt::ConsolePrompt;
    use facecam_core::LbphRecognizer;
    use std::cell::RefCell;
    use std::io::Cursor;

    fn setup() -> (tempfile::TempDir, DatasetStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(tmp.path().join("faces")).unwrap();
        (tmp, store)
    }

    fn prompt(name: &str) -> ConsolePrompt<Cursor<String>> {
        ConsolePrompt::new(Cursor::new(format!("{name}\n")))
    }

    /// At most one camera is open at any point.
    fn exclusive_camera(devices: &FakeDevices) -> bool {
        let mut open = 0i32;
        for e in devices.events() {
            match e {
                Event::CameraOpened => open += 1,
                Event::CameraReleased => open -= 1,
                _ => {}
            }
            if open > 1 {
                return false;
            }
        }
        open == 0
    }

    /// Records the device events seen when the name is requested.
    struct RecordingPrompt {
        log: Log,
        seen: RefCell<Vec<Event>>,
    }

    impl NamePrompt for RecordingPrompt {
        fn ask_name(&mut self) -> std::io::Result<String> {
            *self.seen.borrow_mut() = self.log.borrow().clone();
            Ok("hank".into())
        }
    }

    #[test]
    fn test_end_to_end_enroll_train_recognize() {
        let (_tmp, store) = setup();
        let mut detector = StubDetector::one_face();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![
            Script::unlimited().keys(&[KeyInput::None, KeyInput::Enroll]),
            Script::unlimited(),
            Script::frames(3),
        ]);

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("  carol "))
            .run::<LbphRecognizer>()
            .unwrap();

        let (labels, report) = match outcome {
            Outcome::Recognized { labels, report } => (labels, report),
            other => panic!("expected recognition, got {other:?}"),
        };
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec![(0, "carol")]);
        assert_eq!(report.frames, 3);
        assert_eq!(report.faces, 3);
        assert_eq!(report.stop, Stop::ReadFailed);

        assert_eq!(std::fs::read_dir(store.root().join("carol")).unwrap().count(), 150);
        assert_eq!(devices.count(&Event::Shown), 2 + 150 + 3);
        assert_eq!(devices.count(&Event::CameraOpened), 3);
        assert!(devices.all_released());
        assert!(exclusive_camera(&devices));
    }

    #[test]
    fn test_devices_released_before_name_prompt() {
        let (_tmp, store) = setup();
        let mut detector = StubDetector::none();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![
            Script::unlimited().keys(&[KeyInput::Enroll]),
            Script::frames(1),
        ]);
        let recording = RecordingPrompt {
            log: devices.log.clone(),
            seen: RefCell::default(),
        };

        let mut orchestrator = Orchestrator::new(&store, &mut detector, &overlay, &devices, recording);
        orchestrator.run::<LbphRecognizer>().unwrap();

        let seen = orchestrator.prompt.seen.borrow().clone();
        assert_eq!(
            seen,
            vec![
                Event::CameraOpened,
                Event::PreviewOpened(WINDOW_TITLE.into()),
                Event::Shown,
                Event::PreviewClosed(WINDOW_TITLE.into()),
                Event::CameraReleased,
            ]
        );
    }

    #[test]
    fn test_no_recognition_when_training_fails() {
        let (_tmp, store) = setup();
        let mut detector = StubDetector::none();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![
            Script::unlimited().keys(&[KeyInput::Enroll]),
            Script::frames(5),
        ]);

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("ivan"))
            .run::<LbphRecognizer>()
            .unwrap();

        assert!(matches!(outcome, Outcome::TrainingFailed));
        assert!(store.contains("ivan"));
        assert_eq!(devices.count(&Event::CameraOpened), 2);
        assert!(devices.all_released());
    }

    #[test]
    fn test_existing_identities_without_images_skip_recognition() {
        let (_tmp, store) = setup();
        std::fs::create_dir(store.root().join("ghost")).unwrap();
        std::fs::write(store.root().join("ghost/1.jpg"), b"not a jpeg").unwrap();
        let mut detector = StubDetector::one_face();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![Script::frames(3)]);

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("unused"))
            .run::<LbphRecognizer>()
            .unwrap();

        assert!(matches!(outcome, Outcome::TrainingFailed));
        assert!(devices.events().is_empty());
    }

    #[test]
    fn test_cancel_at_prompt() {
        let (_tmp, store) = setup();
        let mut detector = StubDetector::one_face();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![
            Script::unlimited().keys(&[KeyInput::None, KeyInput::None, KeyInput::Cancel]),
        ]);

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("unused"))
            .run::<LbphRecognizer>()
            .unwrap();

        assert!(matches!(outcome, Outcome::Cancelled));
        assert!(store.identities().unwrap().is_empty());
        assert_eq!(devices.count(&Event::Shown), 3);
        assert!(devices.all_released());
    }

    #[test]
    fn test_read_failure_at_prompt_releases_devices() {
        let (_tmp, store) = setup();
        let mut detector = StubDetector::one_face();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![Script::frames(0)]);

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("unused"))
            .run::<LbphRecognizer>()
            .unwrap();

        assert!(matches!(outcome, Outcome::StreamEnded));
        assert_eq!(
            devices.events(),
            vec![
                Event::CameraOpened,
                Event::PreviewOpened(WINDOW_TITLE.into()),
                Event::PreviewClosed(WINDOW_TITLE.into()),
                Event::CameraReleased,
            ]
        );
    }

    #[test]
    fn test_duplicate_enrollment_rejected() {
        let (_tmp, store) = setup();
        std::fs::create_dir(store.root().join("alice")).unwrap();
        let mut detector = StubDetector::one_face();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(Vec::new());

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("unused"))
            .enroll::<LbphRecognizer>("alice")
            .unwrap();

        assert!(matches!(outcome, Outcome::EnrollmentRejected(ref n) if n == "alice"));
        assert!(devices.events().is_empty());
        assert_eq!(std::fs::read_dir(store.root().join("alice")).unwrap().count(), 0);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let (_tmp, store) = setup();
        let mut detector = StubDetector::one_face();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![Script::unlimited().keys(&[KeyInput::Enroll])]);

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("   "))
            .run::<LbphRecognizer>()
            .unwrap();

        assert!(matches!(outcome, Outcome::EnrollmentRejected(ref n) if n.is_empty()));
        assert_eq!(devices.count(&Event::CameraOpened), 1);
        assert!(devices.all_released());
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_camera_unavailable() {
        let (_tmp, store) = setup();
        let mut detector = StubDetector::one_face();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::broken_camera();

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("unused"))
            .run::<LbphRecognizer>()
            .unwrap();

        assert!(matches!(outcome, Outcome::CameraUnavailable));
    }

    #[test]
    fn test_recognize_entry_with_enrolled_faces() {
        let (_tmp, store) = setup();
        let mut writer = store.enroll("judy").unwrap();
        for i in 0..3u8 {
            writer
                .save(&image::GrayImage::from_fn(40, 40, |x, y| image::Luma([(x * 3 + y + i as u32) as u8])))
                .unwrap();
        }
        let mut detector = StubDetector::one_face();
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![Script::frames(2)]);

        let outcome = Orchestrator::new(&store, &mut detector, &overlay, &devices, prompt("unused"))
            .recognize::<LbphRecognizer>()
            .unwrap();

        let (labels, report) = match outcome {
            Outcome::Recognized { labels, report } => (labels, report),
            other => panic!("expected recognition, got {other:?}"),
        };
        assert_eq!(labels.name(0), Some("judy"));
        assert_eq!(report.frames, 2);
        assert!(devices.all_released());
    }
}
