use std::path::{Path, PathBuf};

const DEFAULT_CASCADE: &str =
    "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml";

/// Fonts tried in order when `FACECAM_FONT_PATH` is unset.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
];

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the face dataset (default: ./faces_dataset).
    pub dataset_dir: PathBuf,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// OpenCV frontal-face Haar cascade XML.
    pub cascade_path: PathBuf,
    /// TTF font for overlay text; `None` when no font could be found.
    pub font_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `FACECAM_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let font_path = std::env::var("FACECAM_FONT_PATH")
            .map(PathBuf::from)
            .ok()
            .or_else(|| {
                FONT_CANDIDATES
                    .iter()
                    .map(Path::new)
                    .find(|p| p.exists())
                    .map(Path::to_path_buf)
            });

        Self {
            dataset_dir: env_path("FACECAM_DATASET_DIR", "faces_dataset"),
            camera_device: std::env::var("FACECAM_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            cascade_path: env_path("FACECAM_CASCADE_PATH", DEFAULT_CASCADE),
            font_path,
        }
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_path_falls_back_to_default() {
        let p = env_path("FACECAM_TEST_SURELY_UNSET_VARIABLE", "faces_dataset");
        assert_eq!(p, PathBuf::from("faces_dataset"));
    }

    #[test]
    fn test_from_env_defaults() {
        // Only checks variables this test process never sets.
        let cfg = Config::from_env();
        if std::env::var("FACECAM_DATASET_DIR").is_err() {
            assert_eq!(cfg.dataset_dir, PathBuf::from("faces_dataset"));
        }
        if std::env::var("FACECAM_CAMERA_DEVICE").is_err() {
            assert_eq!(cfg.camera_device, "/dev/video0");
        }
        if std::env::var("FACECAM_CASCADE_PATH").is_err() {
            assert_eq!(cfg.cascade_path, PathBuf::from(DEFAULT_CASCADE));
        }
    }
}
