//! On-disk face dataset: `<root>/<identity>/<n>.jpg`, one directory per
//! enrolled identity, grayscale JPEG crops numbered from 1.

use image::{GrayImage, ImageFormat};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("identity {0:?} is already enrolled")]
    AlreadyEnrolled(String),
    #[error("invalid identity name {0:?}")]
    InvalidName(String),
    #[error("identity {0:?} is not enrolled")]
    UnknownIdentity(String),
    #[error("dataset I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write sample {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> DatasetError + '_ {
    move |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Directory-per-identity store of face samples.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    /// Open the store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(io_err(&root))?;
        tracing::debug!(root = %root.display(), "dataset store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enrolled identity names, sorted lexicographically.
    pub fn identities(&self) -> Result<Vec<String>, DatasetError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_err(&self.root))? {
            let entry = entry.map_err(io_err(&self.root))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::warn!(name = ?raw, "skipping identity directory with non-UTF-8 name");
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn has_identities(&self) -> Result<bool, DatasetError> {
        Ok(!self.identities()?.is_empty())
    }

    /// Whether anything already occupies this identity's path.
    pub fn contains(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    /// Create the directory for a new identity.
    ///
    /// Fails without touching the filesystem when the identity already exists.
    pub fn enroll(&self, name: &str) -> Result<SampleWriter, DatasetError> {
        validate_name(name)?;
        let dir = self.root.join(name);
        match std::fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(DatasetError::AlreadyEnrolled(name.to_string()));
            }
            Err(e) => return Err(io_err(&dir)(e)),
        }
        tracing::info!(identity = name, dir = %dir.display(), "identity directory created");
        Ok(SampleWriter { dir, written: 0 })
    }

    /// Every readable sample of an identity as grayscale, in file-number order.
    ///
    /// Files that fail to decode are skipped.
    pub fn load_samples(&self, name: &str) -> Result<Vec<GrayImage>, DatasetError> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(DatasetError::UnknownIdentity(name.to_string()));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(io_err(&dir))? {
            let path = entry.map_err(io_err(&dir))?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort_by_key(|p| sample_sort_key(p));

        let mut samples = Vec::with_capacity(paths.len());
        for path in paths {
            match image::open(&path) {
                Ok(img) => samples.push(img.into_luma8()),
                Err(e) => {
                    tracing::trace!(path = %path.display(), error = %e, "skipping unreadable sample");
                }
            }
        }
        Ok(samples)
    }
}

/// Numbered files first, by number; anything else after, by name.
fn sample_sort_key(path: &Path) -> (u64, String) {
    let number = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(u64::MAX);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (number, name)
}

fn validate_name(name: &str) -> Result<(), DatasetError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(DatasetError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Appends numbered samples to one identity's directory.
#[derive(Debug)]
pub struct SampleWriter {
    dir: PathBuf,
    written: u32,
}

impl SampleWriter {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Samples saved so far; also the number of the last file written.
    pub fn written(&self) -> u32 {
        self.written
    }

    /// Save a face crop as the next numbered JPEG.
    pub fn save(&mut self, face: &GrayImage) -> Result<PathBuf, DatasetError> {
        let path = self.dir.join(format!("{}.jpg", self.written + 1));
        face.save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|source| DatasetError::Encode {
                path: path.clone(),
                source,
            })?;
        self.written += 1;
        Ok(path)
    }
}
