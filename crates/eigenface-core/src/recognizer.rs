//! The recognition session: one eigenspace plus the gallery projected into it.

use crate::config::RecognizerConfig;
use crate::database::{Classification, ClassifierDatabase, DatabaseSummary};
use crate::eigenspace::EigenspaceModel;
use crate::error::{RecognitionError, Result};
use crate::localizer::FaceLocalizer;
use crate::progress::ProgressStatus;
use crate::types::{FaceRegion, FeatureVector, RawImage};
use std::sync::Arc;

/// A face region with its identity label.
#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub label: String,
    pub region: Arc<FaceRegion>,
}

impl TrainingSample {
    pub fn new(label: impl Into<String>, region: FaceRegion) -> Self {
        Self {
            label: label.into(),
            region: Arc::new(region),
        }
    }
}

impl AsRef<FaceRegion> for TrainingSample {
    fn as_ref(&self) -> &FaceRegion {
        &self.region
    }
}

/// Owns the trained eigenspace and the classifier database.
///
/// Training replaces both wholesale; `reset` discards them.
#[derive(Debug, Clone, Default)]
pub struct FaceRecognizer {
    config: RecognizerConfig,
    localizer: FaceLocalizer,
    model: Option<EigenspaceModel>,
    database: ClassifierDatabase,
}

impl FaceRecognizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            localizer: FaceLocalizer::new(config.localizer.clone()),
            database: ClassifierDatabase::new(config.classifier.clone()),
            model: None,
            config,
        }
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Crop and normalize a raw photo with this session's localizer settings.
    pub fn localize(&self, image: &RawImage) -> FaceRegion {
        self.localizer.localize(image)
    }

    /// Normalize a raw photo without cropping.
    pub fn normalize(&self, image: &RawImage) -> FaceRegion {
        self.localizer.normalize(image)
    }

    pub fn train(&mut self, samples: &[TrainingSample]) -> Result<DatabaseSummary> {
        self.train_with_progress(samples, &ProgressStatus::new())
    }

    /// Train the eigenspace on `samples` and rebuild the database from their
    /// projections. On error the previous model and database stay in place.
    pub fn train_with_progress(
        &mut self,
        samples: &[TrainingSample],
        progress: &ProgressStatus,
    ) -> Result<DatabaseSummary> {
        let result = self.build(samples, progress);
        progress.finish();
        let (model, database) = result?;

        self.model = Some(model);
        self.database = database;
        let summary = self.database.summary();
        tracing::info!(
            samples = summary.samples,
            classes = summary.classes,
            avg_intra_class = summary.statistics.avg,
            "recognizer trained"
        );
        Ok(summary)
    }

    fn build(
        &self,
        samples: &[TrainingSample],
        progress: &ProgressStatus,
    ) -> Result<(EigenspaceModel, ClassifierDatabase)> {
        if let Some(index) = samples.iter().position(|s| s.label.trim().is_empty()) {
            return Err(RecognitionError::InvalidInput(format!(
                "sample {index} has no label"
            )));
        }

        let model = EigenspaceModel::train_with_progress(samples, progress)?;

        progress.advance("Building feature space");
        let mut database = ClassifierDatabase::new(self.config.classifier.clone());
        for sample in samples {
            let values = model.project(&sample.region, self.config.components)?;
            let vector = FeatureVector::new(values)
                .with_label(sample.label.clone())
                .with_source(Arc::clone(&sample.region));
            database.insert(vector)?;
        }
        Ok((model, database))
    }

    /// Projection coefficients of `region` using the configured dimensionality.
    pub fn project(&self, region: &FaceRegion) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or(RecognitionError::NotTrained)?;
        model.project(region, self.config.components)
    }

    /// Project a shared region into an unlabeled feature vector that keeps a
    /// reference to its source.
    pub fn feature_vector(&self, region: Arc<FaceRegion>) -> Result<FeatureVector> {
        let values = self.project(&region)?;
        Ok(FeatureVector::new(values).with_source(region))
    }

    /// Classify a probe face against the gallery.
    pub fn probe(&self, region: &FaceRegion) -> Result<Classification> {
        let values = self.project(region)?;
        self.database.classify(&values, self.config.neighbors)
    }

    /// Discard the model and every stored sample.
    pub fn reset(&mut self) {
        self.model = None;
        self.database.clear();
        tracing::info!("recognizer reset");
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&EigenspaceModel> {
        self.model.as_ref()
    }

    pub fn database(&self) -> &ClassifierDatabase {
        &self.database
    }
}
