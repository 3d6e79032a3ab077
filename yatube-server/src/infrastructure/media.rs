use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

/// Writes uploaded images below the configured media root. Stored paths are
/// relative to the root and served under `/media/`.
#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn save_post_image(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, std::io::Error> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let relative = format!("posts/{}.{}", Uuid::new_v4(), ext);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        info!(path = %relative, size = bytes.len(), "image stored");
        Ok(relative)
    }
}
