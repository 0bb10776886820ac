use std::env;
use std::path::PathBuf;

/// Where uploaded leave-request evidence is written.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub max_evidence_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("storage/uploads"),
            max_evidence_bytes: 5 * 1024 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_evidence_bytes: env::var("MAX_EVIDENCE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_evidence_bytes),
        }
    }
}
