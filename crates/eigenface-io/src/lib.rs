//! eigenface-io — Image decoding and labeled gallery folders.
//!
//! Turns image files into `RawImage`s for the core pipeline. A gallery is a
//! folder of photos of one person, named after that person.

pub mod gallery;
pub mod source;

pub use gallery::{load_gallery, load_labeled_folder, GalleryError, LabeledImage};
pub use source::{ImageFileSource, PixelSource};
