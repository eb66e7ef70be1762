//! Fit a recognizer over everything in the dataset store.

use crate::dataset::{DatasetError, DatasetStore};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{Label, LabelMap};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("no valid images found in {}", .0.display())]
    NoSamples(PathBuf),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

/// A fitted recognizer together with the labels it was trained on.
#[derive(Debug, Clone)]
pub struct TrainedModel<R> {
    pub recognizer: R,
    pub labels: LabelMap,
    pub sample_count: usize,
}

/// Train `recognizer` on every readable sample in the store.
///
/// Identities get labels 0, 1, ... in sorted-name order; an identity whose
/// files are all unreadable or unusable still gets a label but contributes no
/// samples.
pub fn train<R: FaceRecognizer>(store: &DatasetStore, mut recognizer: R) -> Result<TrainedModel<R>, TrainError> {
    let mut labels = LabelMap::new();
    let mut faces = Vec::new();
    let mut ids: Vec<Label> = Vec::new();

    for name in store.identities()? {
        let label = labels.push(name.as_str());
        let mut usable = 0usize;
        for sample in store.load_samples(&name)? {
            if let Err(e) = recognizer.check_sample(&sample) {
                tracing::trace!(identity = %name, error = %e, "unusable sample skipped");
                continue;
            }
            faces.push(sample);
            ids.push(label);
            usable += 1;
        }
        tracing::debug!(identity = %name, label, samples = usable, "collected samples");
    }

    if faces.is_empty() {
        return Err(TrainError::NoSamples(store.root().to_path_buf()));
    }

    recognizer.train(&faces, &ids)?;

    tracing::info!(
        identities = labels.len(),
        samples = faces.len(),
        "recognizer trained"
    );

    Ok(TrainedModel {
        recognizer,
        labels,
        sample_count: faces.len(),
    })
}
