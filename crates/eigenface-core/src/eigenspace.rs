//! Eigenface training and projection.
//!
//! Uses the N×N Gram-matrix trick: eigenvectors of `Dᵗ·D` lifted through `D`
//! are eigenvectors of the P×P covariance `D·Dᵗ`, which is never formed.

use crate::error::{RecognitionError, Result};
use crate::linalg;
use crate::progress::ProgressStatus;
use crate::types::FaceRegion;
use ndarray::{s, Array1, Array2, Axis};

/// Eigenvector norms and normalized eigenvalues below this are insignificant.
pub const EIGEN_THRESHOLD: f64 = 1e-4;

/// A trained eigenspace: mean face plus the leading eigenfaces.
#[derive(Debug, Clone)]
pub struct EigenspaceModel {
    mean_face: Array1<f64>,
    /// P×K, one eigenface per column, unit-norm or exactly zero.
    eigen_basis: Array2<f64>,
    /// Descending, non-negative, length K.
    eigen_values: Array1<f64>,
    face_width: u32,
    face_height: u32,
}

impl EigenspaceModel {
    /// Train on a batch of equally sized faces.
    pub fn train<F: AsRef<FaceRegion>>(faces: &[F]) -> Result<Self> {
        Self::train_with_progress(faces, &ProgressStatus::new())
    }

    /// Train, reporting each stage on `progress`.
    ///
    /// Nothing is returned unless every stage succeeds.
    pub fn train_with_progress<F: AsRef<FaceRegion>>(
        faces: &[F],
        progress: &ProgressStatus,
    ) -> Result<Self> {
        progress.advance("Constructing matrix");
        let first = faces
            .first()
            .ok_or_else(|| RecognitionError::InvalidInput("no faces provided for training".into()))?
            .as_ref();
        let pixel_count = first.pixel_count();
        for (index, face) in faces.iter().enumerate().skip(1) {
            let actual = face.as_ref().pixel_count();
            if actual != pixel_count {
                return Err(RecognitionError::SampleDimensionMismatch {
                    index,
                    expected: pixel_count,
                    actual,
                });
            }
        }
        let face_count = faces.len();
        let mut samples = Array2::<f64>::zeros((pixel_count, face_count));
        for (col, face) in faces.iter().enumerate() {
            for (row, &px) in face.as_ref().pixels().iter().enumerate() {
                samples[[row, col]] = f64::from(px);
            }
        }
        tracing::debug!(pixels = pixel_count, faces = face_count, "sample matrix built");

        progress.advance("Calculating averages");
        let mean_face = samples.mean_axis(Axis(1)).ok_or_else(|| {
            RecognitionError::NumericFailure("cannot average an empty sample matrix".into())
        })?;

        progress.advance("Computing difference matrix");
        let diff = &samples - &mean_face.view().insert_axis(Axis(1));

        progress.advance("Calculating eigenvectors");
        let gram = linalg::gram(&diff);
        let eigen = linalg::symmetric_eigen(&gram)?;
        let mut lifted = linalg::multiply(&diff, &eigen.vectors)?;
        for mut column in lifted.axis_iter_mut(Axis(1)) {
            let norm = column.dot(&column).sqrt();
            if norm > EIGEN_THRESHOLD {
                column.mapv_inplace(|v| v / norm);
            } else {
                column.fill(0.0);
            }
        }

        progress.advance("Sorting eigenvectors");
        // Stable: equal eigenvalues keep decomposition order.
        let mut order: Vec<usize> = (0..face_count).collect();
        order.sort_by(|&a, &b| eigen.values[b].total_cmp(&eigen.values[a]));

        progress.advance("Extracting eigenvalues");
        let divisor = face_count.saturating_sub(1).max(1) as f64;
        let values: Vec<f64> = order
            .iter()
            .map(|&i| (eigen.values[i] / divisor).max(0.0))
            .collect();

        progress.advance("Selecting significant eigenvectors");
        let significant = values.iter().take_while(|&&v| v >= EIGEN_THRESHOLD).count();
        let components = if significant == 0 {
            tracing::warn!("no significant eigenvectors; keeping the largest one");
            1
        } else {
            significant
        };

        let eigen_basis = Array2::from_shape_fn((pixel_count, components), |(row, col)| {
            lifted[[row, order[col]]]
        });
        let eigen_values = Array1::from(values[..components].to_vec());

        tracing::info!(
            pixels = pixel_count,
            faces = face_count,
            components,
            top_eigenvalue = eigen_values[0],
            "eigenspace trained"
        );
        progress.advance("Training complete");

        Ok(Self {
            mean_face,
            eigen_basis,
            eigen_values,
            face_width: first.width(),
            face_height: first.height(),
        })
    }

    /// Project a face onto the first `k` eigenfaces (clamped to K).
    pub fn project(&self, face: &FaceRegion, k: usize) -> Result<Vec<f64>> {
        self.project_pixels(&face.to_f64(), k)
    }

    /// Project raw pixel intensities. `k == 0` yields an empty vector.
    pub fn project_pixels(&self, pixels: &[f64], k: usize) -> Result<Vec<f64>> {
        if pixels.len() != self.pixel_count() {
            return Err(RecognitionError::DimensionMismatch {
                expected: self.pixel_count(),
                actual: pixels.len(),
            });
        }
        let k = k.min(self.components());
        if k == 0 {
            return Ok(Vec::new());
        }
        let diff: Array1<f64> = pixels
            .iter()
            .zip(self.mean_face.iter())
            .map(|(p, m)| p - m)
            .collect();
        let basis = self.eigen_basis.slice(s![.., ..k]);
        Ok(basis.t().dot(&diff).to_vec())
    }

    /// Number of retained eigenfaces, K.
    pub fn components(&self) -> usize {
        self.eigen_values.len()
    }

    /// Pixel count P every projected face must have.
    pub fn pixel_count(&self) -> usize {
        self.mean_face.len()
    }

    pub fn mean_face(&self) -> &Array1<f64> {
        &self.mean_face
    }

    pub fn eigen_basis(&self) -> &Array2<f64> {
        &self.eigen_basis
    }

    pub fn eigen_values(&self) -> &Array1<f64> {
        &self.eigen_values
    }

    /// Width and height of the faces the model was trained on.
    pub fn face_size(&self) -> (u32, u32) {
        (self.face_width, self.face_height)
    }

    /// Mean face as an 8-bit image, intensities clamped to 0..=255.
    pub fn mean_face_image(&self) -> image::GrayImage {
        let width = self.face_width;
        image::GrayImage::from_fn(self.face_width, self.face_height, |x, y| {
            let v = self.mean_face[(y * width + x) as usize];
            image::Luma([v.clamp(0.0, 255.0) as u8])
        })
    }
}
