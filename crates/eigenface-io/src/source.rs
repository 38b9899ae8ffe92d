use eigenface_core::{RawImage, RecognitionError};
use std::path::Path;

/// Anything that can turn a file into packed RGB pixels.
pub trait PixelSource {
    fn decode(&self, path: &Path) -> Result<RawImage, RecognitionError>;
}

/// Decodes JPEG and PNG files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileSource;

impl PixelSource for ImageFileSource {
    fn decode(&self, path: &Path) -> Result<RawImage, RecognitionError> {
        let decoded = image::open(path).map_err(|e| RecognitionError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        tracing::debug!(path = %path.display(), width, height, "image decoded");
        RawImage::from_rgb8(width, height, rgb.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png_keeps_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        let mut img = image::RgbImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgb([224, 160, 112]));
        img.save(&path).unwrap();

        let raw = ImageFileSource.decode(&path).unwrap();
        assert_eq!((raw.width(), raw.height()), (3, 2));
        assert_eq!(raw.rgb_at(2, 1), 0xE0A070);
        assert_eq!(raw.rgb_at(0, 0), 0);
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        match ImageFileSource.decode(&path) {
            Err(RecognitionError::Decode { path: p, .. }) => assert!(p.ends_with("broken.jpg")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_missing_file() {
        let err = ImageFileSource
            .decode(Path::new("/nonexistent/eigenface/probe.png"))
            .unwrap_err();
        assert!(matches!(err, RecognitionError::Decode { .. }));
    }
}
