//! Live recognition: label every detected face with identity and confidence.

use crate::capture::crop_face;
use crate::devices::{Devices, FrameSource, Preview, Stop, WINDOW_TITLE};
use crate::overlay::{Overlay, TextSize, GREEN, RED};
use facecam_core::{
    is_known, to_confidence, DetectParams, DetectorError, FaceDetector, FaceRecognizer, LabelMap, Prediction,
    TrainedModel,
};
use facecam_hw::{CameraError, DisplayError, KeyInput};
use image::Rgb;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("camera unavailable: {0}")]
    Camera(#[from] CameraError),
    #[error("display error: {0}")]
    Display(#[from] DisplayError),
    #[error("face detection failed: {0}")]
    Detector(#[from] DetectorError),
}

/// Display decision for one classified face.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Known { name: String, confidence: f64 },
    Unknown { confidence: f64 },
}

impl Verdict {
    pub fn text(&self) -> String {
        match self {
            Verdict::Known { name, confidence } => format!("{name} ({confidence:.1}%)"),
            Verdict::Unknown { .. } => "Unknown".to_string(),
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Verdict::Known { confidence, .. } | Verdict::Unknown { confidence } => *confidence,
        }
    }

    pub fn color(&self) -> Rgb<u8> {
        match self {
            Verdict::Known { .. } => GREEN,
            Verdict::Unknown { .. } => RED,
        }
    }
}

/// Map a prediction to the label shown on screen.
///
/// A confidence of exactly 50 is still named. A label missing from the map
/// is shown as unknown.
pub fn label_for(prediction: &Prediction, labels: &LabelMap) -> Verdict {
    let confidence = to_confidence(prediction.distance);
    match labels.name(prediction.label) {
        Some(name) if is_known(confidence) => Verdict::Known {
            name: name.to_string(),
            confidence,
        },
        _ => Verdict::Unknown { confidence },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionReport {
    pub frames: u64,
    pub faces: u64,
    pub stop: Stop,
}

pub struct RecognitionController<'a, D, R> {
    detector: &'a mut D,
    model: &'a TrainedModel<R>,
    overlay: &'a Overlay,
    params: DetectParams,
}

impl<'a, D: FaceDetector, R: FaceRecognizer> RecognitionController<'a, D, R> {
    pub fn new(detector: &'a mut D, model: &'a TrainedModel<R>, overlay: &'a Overlay) -> Self {
        Self {
            detector,
            model,
            overlay,
            params: DetectParams::default(),
        }
    }

    /// Run until Escape, a closed window, or a failed camera read.
    pub fn run<V: Devices>(&mut self, devices: &V) -> Result<RecognitionReport, RecognizeError> {
        let mut camera = devices.open_camera()?;
        let mut preview = devices.open_preview(WINDOW_TITLE);

        println!("Recognition started (Esc to quit).");
        tracing::info!(identities = self.model.labels.len(), "recognition started");

        let (mut frames, mut faces) = (0u64, 0u64);
        let stop = loop {
            let frame = match camera.read() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(error = %e, "camera read failed, ending recognition");
                    break Stop::ReadFailed;
                }
            };
            frames += 1;

            let gray = frame.to_gray();
            let mut image = frame.image;
            for rect in self.detector.detect(&gray, &self.params)? {
                let Some((rect, face)) = crop_face(&gray, rect) else {
                    continue;
                };
                let prediction = match self.model.recognizer.predict(&face) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!(error = %e, ?rect, "prediction failed, face skipped");
                        continue;
                    }
                };
                faces += 1;

                let verdict = label_for(&prediction, &self.model.labels);
                tracing::trace!(
                    label = prediction.label,
                    distance = prediction.distance,
                    confidence = verdict.confidence(),
                    "face classified"
                );
                let text_y = rect.y as i32 - 10;
                self.overlay
                    .draw_text(&mut image, &verdict.text(), rect.x as i32, text_y, TextSize::Label, verdict.color());
                self.overlay.draw_box(&mut image, rect, verdict.color());
            }

            preview.show(&image)?;
            if preview.poll_key() == KeyInput::Cancel {
                break Stop::Cancelled;
            }
        };

        drop(preview);
        drop(camera);

        tracing::info!(frames, faces, stop = ?stop, "recognition finished");
        Ok(RecognitionReport { frames, faces, stop })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::fake::{Event, FakeDevices, Phase, StubDetector};
    use facecam_core::{Label, RecognizerError};
    use image::GrayImage;
    use std::cell::Cell;

    fn labels(names: &[&str]) -> LabelMap {
        let mut map = LabelMap::new();
        for n in names {
            map.push(*n);
        }
        map
    }

    fn pred(label: Label, distance: f64) -> Prediction {
        Prediction { label, distance }
    }

    #[test]
    fn test_exact_threshold_is_named() {
        let v = label_for(&pred(0, 60.0), &labels(&["alice"]));
        assert_eq!(
            v,
            Verdict::Known {
                name: "alice".into(),
                confidence: 50.0
            }
        );
        assert_eq!(v.text(), "alice (50.0%)");
        assert_eq!(v.color(), GREEN);
    }

    #[test]
    fn test_below_threshold_is_unknown() {
        let v = label_for(&pred(0, 60.5), &labels(&["alice"]));
        assert!(matches!(v, Verdict::Unknown { .. }));
        assert_eq!(v.text(), "Unknown");
        assert_eq!(v.color(), RED);
    }

    #[test]
    fn test_perfect_match_text() {
        let v = label_for(&pred(1, 0.0), &labels(&["alice", "bob"]));
        assert_eq!(v.text(), "bob (100.0%)");
    }

    #[test]
    fn test_unmapped_label_is_unknown() {
        let v = label_for(&pred(-1, 0.0), &labels(&["alice"]));
        assert!(matches!(v, Verdict::Unknown { .. }));
    }

    /// Returns a fixed prediction, or fails every other call.
    struct FixedRecognizer {
        prediction: Prediction,
        fail_alternate: bool,
        calls: Cell<u32>,
    }

    impl FaceRecognizer for FixedRecognizer {
        fn train(&mut self, _images: &[GrayImage], _labels: &[Label]) -> Result<(), RecognizerError> {
            Ok(())
        }

        fn predict(&self, _image: &GrayImage) -> Result<Prediction, RecognizerError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if self.fail_alternate && n % 2 == 1 {
                return Err(RecognizerError::NotTrained);
            }
            Ok(self.prediction)
        }
    }

    fn model(fail_alternate: bool) -> TrainedModel<FixedRecognizer> {
        TrainedModel {
            recognizer: FixedRecognizer {
                prediction: pred(0, 12.0),
                fail_alternate,
                calls: Cell::new(0),
            },
            labels: labels(&["carol"]),
            sample_count: 1,
        }
    }

    #[test]
    fn test_runs_until_escape() {
        let mut detector = StubDetector::one_face();
        let model = model(false);
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![
            Phase::unlimited().keys(&[KeyInput::None, KeyInput::None, KeyInput::None, KeyInput::Cancel]),
        ]);

        let report = RecognitionController::new(&mut detector, &model, &overlay)
            .run(&devices)
            .unwrap();

        assert_eq!(report.stop, Stop::Cancelled);
        assert_eq!(report.frames, 4);
        assert_eq!(report.faces, 4);
        assert_eq!(devices.count(&Event::Shown), 4);
        assert!(devices.all_released());
    }

    #[test]
    fn test_failed_prediction_skips_face() {
        let mut detector = StubDetector::one_face();
        let model = model(true);
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![Phase::frames(4)]);

        let report = RecognitionController::new(&mut detector, &model, &overlay)
            .run(&devices)
            .unwrap();

        assert_eq!(report.stop, Stop::ReadFailed);
        assert_eq!(report.frames, 4);
        assert_eq!(report.faces, 2);
    }

    #[test]
    fn test_read_failure_on_first_frame_releases_devices() {
        let mut detector = StubDetector::one_face();
        let model = model(false);
        let overlay = Overlay::without_font();
        let devices = FakeDevices::new(vec![Phase::frames(0)]);

        let report = RecognitionController::new(&mut detector, &model, &overlay)
            .run(&devices)
            .unwrap();

        assert_eq!(report.frames, 0);
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
}
