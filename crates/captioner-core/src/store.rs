//! Caption persistence.
//!
//! The generation manager never writes anything itself; callers hand each
//! successful result to a [`CaptionStore`].

use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Where captions are kept between runs.
pub trait CaptionStore: Send + Sync {
    /// Persist the caption for `image`, replacing any previous one.
    fn save_caption(&self, image: &Path, caption: &str) -> Result<()>;

    /// Load the caption for `image`. An image without one loads as `""`.
    fn load_caption(&self, image: &Path) -> Result<String>;

    /// Whether `image` already has a non-blank caption.
    fn has_caption(&self, image: &Path) -> Result<bool> {
        Ok(!self.load_caption(image)?.trim().is_empty())
    }
}

/// Stores each caption in a text file next to its image.
///
/// `photos/cat.jpg` is captioned by `photos/cat.txt`, the layout most
/// training tools expect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarStore;

impl SidecarStore {
    pub fn new() -> Self {
        Self
    }

    /// Path of the sidecar file for `image`.
    pub fn caption_path(image: &Path) -> PathBuf {
        image.with_extension("txt")
    }
}

impl CaptionStore for SidecarStore {
    fn save_caption(&self, image: &Path, caption: &str) -> Result<()> {
        let path = Self::caption_path(image);
        std::fs::write(&path, caption.trim_end())?;
        tracing::debug!("Saved caption to {:?}", path);
        Ok(())
    }

    fn load_caption(&self, image: &Path) -> Result<String> {
        match std::fs::read_to_string(Self::caption_path(image)) {
            Ok(caption) => Ok(caption),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}
