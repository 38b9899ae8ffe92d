//! Labeled gallery folders.
//!
//! A labeled folder holds photos of one identity and its name is the label:
//!
//! ```text
//! gallery/
//!   alice/  01.jpg 02.png
//!   bob/    a.jpeg b.jpg
//! ```
//!
//! Either `gallery/alice` or `gallery` itself can be loaded.

use crate::source::PixelSource;
use eigenface_core::RawImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no usable images in {0}")]
    Empty(PathBuf),

    #[error("cannot derive a label from {0}")]
    Unlabeled(PathBuf),
}

/// A decoded gallery photo and the identity it belongs to.
#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub label: String,
    pub path: PathBuf,
    pub image: RawImage,
}

/// `.jpg`, `.jpeg` or `.png`, any case.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    let io_err = |source| GalleryError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        entries.push(entry.map_err(io_err)?.path());
    }
    entries.sort();
    Ok(entries)
}

/// Supported image files directly inside `dir`, sorted by path.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    Ok(read_dir_sorted(dir)?
        .into_iter()
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect())
}

fn folder_label(dir: &Path) -> Result<String, GalleryError> {
    let resolved;
    let named = match dir.file_name() {
        Some(_) => dir,
        None => {
            resolved = std::fs::canonicalize(dir).map_err(|source| GalleryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            resolved.as_path()
        }
    };
    named
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| GalleryError::Unlabeled(dir.to_path_buf()))
}

/// Decode every photo in one labeled folder. Undecodable files are skipped.
pub fn load_labeled_folder<S: PixelSource>(
    source: &S,
    dir: &Path,
) -> Result<Vec<LabeledImage>, GalleryError> {
    let label = folder_label(dir)?;
    let mut images = Vec::new();
    for path in image_files(dir)? {
        match source.decode(&path) {
            Ok(image) => images.push(LabeledImage {
                label: label.clone(),
                path,
                image,
            }),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping image"),
        }
    }
    if images.is_empty() {
        return Err(GalleryError::Empty(dir.to_path_buf()));
    }
    tracing::info!(label = %label, count = images.len(), "loaded labeled folder");
    Ok(images)
}

/// Load a labeled folder, or a root whose subfolders are labeled folders.
///
/// Subfolders without usable images are skipped; the root itself must yield
/// at least one image.
pub fn load_gallery<S: PixelSource>(
    source: &S,
    dir: &Path,
) -> Result<Vec<LabeledImage>, GalleryError> {
    if !image_files(dir)?.is_empty() {
        return load_labeled_folder(source, dir);
    }

    let mut images = Vec::new();
    for sub in read_dir_sorted(dir)?.into_iter().filter(|p| p.is_dir()) {
        match load_labeled_folder(source, &sub) {
            Ok(mut folder) => images.append(&mut folder),
            Err(GalleryError::Empty(path)) => {
                tracing::warn!(path = %path.display(), "skipping folder without images")
            }
            Err(e) => return Err(e),
        }
    }
    if images.is_empty() {
        return Err(GalleryError::Empty(dir.to_path_buf()));
    }
    Ok(images)
}
