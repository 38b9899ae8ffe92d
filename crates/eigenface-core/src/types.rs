use crate::error::{RecognitionError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Canonical face region width in pixels.
pub const FACE_WIDTH: u32 = 48;
/// Canonical face region height in pixels.
pub const FACE_HEIGHT: u32 = 64;

/// A decoded color image with packed `0xRRGGBB` pixels in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl RawImage {
    /// Build an image from packed RGB pixels. Bits above the low 24 are ignored.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RecognitionError::InvalidInput(format!(
                "image must be at least 1x1, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(RecognitionError::DimensionMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        let pixels = pixels.into_iter().map(|p| p & 0x00FF_FFFF).collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Caller guarantees `pixels.len() == width * height` and both are non-zero.
    pub(crate) fn from_parts(width: u32, height: u32, pixels: Vec<u32>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Build an image from interleaved 8-bit RGB bytes.
    pub fn from_rgb8(width: u32, height: u32, rgb: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(RecognitionError::DimensionMismatch {
                expected,
                actual: rgb.len(),
            });
        }
        let pixels = rgb
            .chunks_exact(3)
            .map(|c| pack_rgb(c[0], c[1], c[2]))
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGB pixels, row-major.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Packed RGB value at `(x, y)`.
    pub fn rgb_at(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Grayscale intensities as the plain mean of R, G and B (not luma-weighted).
    pub fn grayscale(&self) -> Vec<u8> {
        self.pixels.iter().map(|&p| gray_of(p)).collect()
    }
}

/// Pack 8-bit channels into `0xRRGGBB`.
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Split `0xRRGGBB` into channels.
pub fn unpack_rgb(rgb: u32) -> (u8, u8, u8) {
    (((rgb >> 16) & 0xFF) as u8, ((rgb >> 8) & 0xFF) as u8, (rgb & 0xFF) as u8)
}

fn gray_of(rgb: u32) -> u8 {
    let (r, g, b) = unpack_rgb(rgb);
    ((u32::from(r) + u32::from(g) + u32::from(b)) / 3) as u8
}

/// A normalized grayscale face crop; the unit exchanged between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FaceRegion {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if expected == 0 {
            return Err(RecognitionError::InvalidInput(format!(
                "face region must be at least 1x1, got {width}x{height}"
            )));
        }
        if pixels.len() != expected {
            return Err(RecognitionError::DimensionMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub(crate) fn from_parts(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Pixels widened to `f64` for the linear algebra stages.
    pub fn to_f64(&self) -> Vec<f64> {
        self.pixels.iter().map(|&p| f64::from(p)).collect()
    }

    /// Copy into an `image` buffer for saving or display.
    pub fn to_gray_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([self.pixels[(y * self.width + x) as usize]])
        })
    }
}

impl AsRef<FaceRegion> for FaceRegion {
    fn as_ref(&self) -> &FaceRegion {
        self
    }
}

/// Projection coefficients of one face onto the leading eigenfaces.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
    /// Identity label; `None` for probes.
    pub label: Option<String>,
    /// The face this vector was projected from.
    #[serde(skip)]
    pub source: Option<Arc<FaceRegion>>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            label: None,
            source: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_source(mut self, source: Arc<FaceRegion>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance to another feature vector.
    pub fn euclidean_distance(&self, other: &FeatureVector) -> Result<f64> {
        euclidean_distance(&self.values, &other.values)
    }
}

/// Standard L2 distance. Both vectors must share a length.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(RecognitionError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(l2(a, b))
}

/// L2 distance without the length check; callers validate.
pub(crate) fn l2(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_symmetric_and_non_negative() {
        let a = [1.0, -2.0, 3.5];
        let b = [0.5, 4.0, -1.0];
        let ab = euclidean_distance(&a, &b).unwrap();
        let ba = euclidean_distance(&b, &a).unwrap();
        assert!(ab > 0.0);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_distance_zero_only_for_identical() {
        let a = [3.0, 4.0];
        assert_eq!(euclidean_distance(&a, &a).unwrap(), 0.0);
        assert!(euclidean_distance(&a, &[3.0, 4.000001]).unwrap() > 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        let d = euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_length_mismatch() {
        let err = euclidean_distance(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            RecognitionError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_raw_image_grayscale_is_channel_mean() {
        let img = RawImage::new(2, 1, vec![pack_rgb(30, 60, 90), pack_rgb(255, 0, 0)]).unwrap();
        assert_eq!(img.grayscale(), vec![60, 85]);
    }

    #[test]
    fn test_raw_image_rejects_wrong_length() {
        assert!(RawImage::new(2, 2, vec![0; 3]).is_err());
        assert!(RawImage::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_raw_image_from_rgb8() {
        let img = RawImage::from_rgb8(1, 2, &[1, 2, 3, 250, 251, 252]).unwrap();
        assert_eq!(img.rgb_at(0, 0), 0x010203);
        assert_eq!(unpack_rgb(img.rgb_at(0, 1)), (250, 251, 252));
    }

    #[test]
    fn test_face_region_dimension_check() {
        let err = FaceRegion::new(4, 4, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            RecognitionError::DimensionMismatch {
                expected: 16,
                actual: 15
            }
        );
    }
}
