//! eigenface-core — Eigenface face identification engine.
//!
//! Skin-tone localization crops a face out of a color photo, PCA over a
//! gallery of cropped faces yields an eigenspace, and an open-set k-NN
//! classifier labels probe projections or reports them as unknown.

pub mod config;
pub mod database;
pub mod eigenspace;
pub mod error;
pub mod linalg;
pub mod localizer;
pub mod progress;
pub mod recognizer;
pub mod types;

pub use config::{ClassifierConfig, LocalizerConfig, RecognizerConfig};
pub use database::{
    Classification, ClassifierDatabase, DatabaseSummary, DistanceStatistics, Neighbor,
    RejectReason, UNKNOWN_LABEL,
};
pub use eigenspace::EigenspaceModel;
pub use error::{RecognitionError, Result};
pub use localizer::FaceLocalizer;
pub use progress::ProgressStatus;
pub use recognizer::{FaceRecognizer, TrainingSample};
pub use types::{FaceRegion, FeatureVector, RawImage, FACE_HEIGHT, FACE_WIDTH};
