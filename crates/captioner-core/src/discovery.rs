//! Image listing: finding the images in a folder.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;
use crate::error::Result;

/// Source of image paths for folder batches.
pub trait ImageSource: Send + Sync {
    /// List the images under `folder`, in a stable order.
    fn list_images(&self, folder: &Path) -> Result<Vec<PathBuf>>;
}

/// Discovers image files on the local filesystem.
pub struct FileDiscovery {
    config: ProcessingConfig,
}

impl FileDiscovery {
    /// Create a new file discovery instance.
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    /// Discover all supported image files at a path.
    ///
    /// If path is a file, returns it if supported.
    /// If path is a directory, recursively finds all supported files.
    pub fn discover(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            if self.is_supported(path) {
                return vec![path.to_path_buf()];
            }
            return vec![];
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file() && self.is_supported(entry.path()))
            .map(|entry| entry.into_path())
            .collect();

        // Sort by path for deterministic ordering
        files.sort();
        files
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

impl ImageSource for FileDiscovery {
    fn list_images(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        // Surface a missing folder as an error instead of an empty batch.
        std::fs::metadata(folder)?;
        let images = self.discover(folder);
        tracing::debug!("Found {} images in {:?}", images.len(), folder);
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_supported() {
        let discovery = FileDiscovery::new(ProcessingConfig::default());

        assert!(discovery.is_supported(Path::new("test.jpg")));
        assert!(discovery.is_supported(Path::new("test.JPG")));
        assert!(discovery.is_supported(Path::new("test.jpeg")));
        assert!(discovery.is_supported(Path::new("test.png")));
        assert!(discovery.is_supported(Path::new("test.webp")));
        assert!(!discovery.is_supported(Path::new("test.txt")));
        assert!(!discovery.is_supported(Path::new("noext")));
    }

    #[test]
    fn test_list_images_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.png"), b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a.txt"), b"caption").unwrap();
        fs::write(dir.path().join("nested").join("c.webp"), b"x").unwrap();

        let discovery = FileDiscovery::new(ProcessingConfig::default());
        let images = discovery.list_images(dir.path()).unwrap();

        assert_eq!(
            images,
            vec![
                dir.path().join("a.jpg"),
                dir.path().join("b.png"),
                dir.path().join("nested").join("c.webp"),
            ]
        );
    }

    #[test]
    fn test_single_file_yields_itself() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("photo.jpeg");
        fs::write(&image, b"x").unwrap();

        let discovery = FileDiscovery::new(ProcessingConfig::default());
        assert_eq!(discovery.list_images(&image).unwrap(), vec![image]);
    }

    #[test]
    fn test_missing_folder_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = FileDiscovery::new(ProcessingConfig::default());
        assert!(discovery.list_images(&dir.path().join("gone")).is_err());
    }
}
