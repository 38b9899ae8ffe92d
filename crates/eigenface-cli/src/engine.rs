use eigenface_core::{
    Classification, DatabaseSummary, FaceRecognizer, FaceRegion, ProgressStatus,
    RecognitionError, RecognizerConfig, TrainingSample,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// How often the foreground samples the training stage.
const PROGRESS_POLL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("recognition error: {0}")]
    Recognition(#[from] RecognitionError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Trained model and gallery overview.
#[derive(Debug, Clone)]
pub struct ModelReport {
    pub summary: DatabaseSummary,
    pub labels: Vec<String>,
    pub components: usize,
    pub eigen_values: Vec<f64>,
    pub threshold: f64,
}

/// Gallery samples (and optionally a probe) in the first three eigenface axes.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSpaceReport {
    pub labels: Vec<String>,
    pub points: Vec<[f64; 3]>,
    pub probe: Option<[f64; 3]>,
}

/// Messages sent from the CLI to the engine thread.
enum EngineRequest {
    Train {
        samples: Vec<TrainingSample>,
        progress: ProgressStatus,
        reply: oneshot::Sender<Result<DatabaseSummary, EngineError>>,
    },
    Probe {
        region: FaceRegion,
        reply: oneshot::Sender<Result<Classification, EngineError>>,
    },
    Describe {
        reply: oneshot::Sender<Result<ModelReport, EngineError>>,
    },
    FeatureSpace {
        probe: Option<FaceRegion>,
        reply: oneshot::Sender<Result<FeatureSpaceReport, EngineError>>,
    },
    MeanFace {
        reply: oneshot::Sender<Result<image::GrayImage, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Train on `samples`, logging each stage change until the engine replies.
    pub async fn train(
        &self,
        samples: Vec<TrainingSample>,
    ) -> Result<DatabaseSummary, EngineError> {
        let progress = ProgressStatus::new();
        let watched = progress.clone();
        let reply = self.request(|reply| EngineRequest::Train {
            samples,
            progress,
            reply,
        });
        tokio::pin!(reply);

        let mut ticker = tokio::time::interval(PROGRESS_POLL);
        let mut last = String::new();
        loop {
            tokio::select! {
                result = &mut reply => return result,
                _ = ticker.tick() => {
                    let message = watched.message();
                    if !message.is_empty() && message != last {
                        tracing::info!(stage = %message, "training");
                        last = message;
                    }
                }
            }
        }
    }

    pub async fn probe(&self, region: FaceRegion) -> Result<Classification, EngineError> {
        self.request(|reply| EngineRequest::Probe { region, reply })
            .await
    }

    pub async fn describe(&self) -> Result<ModelReport, EngineError> {
        self.request(|reply| EngineRequest::Describe { reply }).await
    }

    pub async fn feature_space(
        &self,
        probe: Option<FaceRegion>,
    ) -> Result<FeatureSpaceReport, EngineError> {
        self.request(|reply| EngineRequest::FeatureSpace { probe, reply })
            .await
    }

    pub async fn mean_face(&self) -> Result<image::GrayImage, EngineError> {
        self.request(|reply| EngineRequest::MeanFace { reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the recognizer and serves one request at a time, so a
/// training run always completes before the next request is looked at.
pub fn spawn_engine(config: RecognizerConfig) -> Result<EngineHandle, EngineError> {
    let mut recognizer = FaceRecognizer::new(config);
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("eigenface-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Train {
                        samples,
                        progress,
                        reply,
                    } => {
                        let result = recognizer
                            .train_with_progress(&samples, &progress)
                            .map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Probe { region, reply } => {
                        let _ = reply.send(recognizer.probe(&region).map_err(EngineError::from));
                    }
                    EngineRequest::Describe { reply } => {
                        let _ = reply.send(run_describe(&recognizer));
                    }
                    EngineRequest::FeatureSpace { probe, reply } => {
                        let _ = reply.send(run_feature_space(&recognizer, probe.as_ref()));
                    }
                    EngineRequest::MeanFace { reply } => {
                        let result = recognizer
                            .model()
                            .map(|m| m.mean_face_image())
                            .ok_or(EngineError::Recognition(RecognitionError::NotTrained));
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn run_describe(recognizer: &FaceRecognizer) -> Result<ModelReport, EngineError> {
    let model = recognizer.model().ok_or(RecognitionError::NotTrained)?;
    let database = recognizer.database();
    Ok(ModelReport {
        summary: database.summary(),
        labels: database.labels().to_vec(),
        components: model.components(),
        eigen_values: model.eigen_values().to_vec(),
        threshold: database.acceptance_threshold(),
    })
}

fn run_feature_space(
    recognizer: &FaceRecognizer,
    probe: Option<&FaceRegion>,
) -> Result<FeatureSpaceReport, EngineError> {
    let projected = probe.map(|p| recognizer.project(p)).transpose()?;
    let database = recognizer.database();
    let mut points = database.feature_space_3d(projected.as_deref());
    let probe = match projected {
        Some(_) => points.pop(),
        None => None,
    };
    Ok(FeatureSpaceReport {
        labels: database.samples().iter().map(|s| s.label.clone()).collect(),
        points,
        probe,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eigenface_core::RejectReason;

    fn region(level: u8) -> FaceRegion {
        FaceRegion::new(4, 4, (0..16).map(|i| level.saturating_add(i)).collect()).unwrap()
    }

    fn samples() -> Vec<TrainingSample> {
        vec![
            TrainingSample::new("a", region(10)),
            TrainingSample::new("a", region(12)),
            TrainingSample::new("b", region(200)),
            TrainingSample::new("b", region(203)),
        ]
    }

    #[tokio::test]
    async fn test_requests_before_training_fail() {
        let engine = spawn_engine(RecognizerConfig::default()).unwrap();
        assert!(matches!(
            engine.probe(region(10)).await,
            Err(EngineError::Recognition(RecognitionError::NotTrained))
        ));
        assert!(engine.mean_face().await.is_err());
        assert!(engine.describe().await.is_err());
    }

    #[tokio::test]
    async fn test_train_then_probe() {
        let engine = spawn_engine(RecognizerConfig::default()).unwrap();
        let summary = engine.train(samples()).await.unwrap();
        assert_eq!(summary.samples, 4);
        assert_eq!(summary.classes, 2);

        // k = 5 clamps to 4, so two votes is a tie and never a majority.
        let result = engine.probe(region(11)).await.unwrap();
        assert_eq!(result.k, 4);
        assert_eq!(result.rejection, Some(RejectReason::NoMajority));

        let report = engine.describe().await.unwrap();
        assert_eq!(report.labels, ["a", "b"]);
        assert_eq!(report.components, report.eigen_values.len());
    }

    #[tokio::test]
    async fn test_feature_space_appends_probe() {
        let engine = spawn_engine(RecognizerConfig::default()).unwrap();
        engine.train(samples()).await.unwrap();
        let report = engine.feature_space(Some(region(100))).await.unwrap();
        assert_eq!(report.points.len(), 4);
        assert_eq!(report.labels.len(), 4);
        assert!(report.probe.is_some());

        let mean = engine.mean_face().await.unwrap();
        assert_eq!(mean.dimensions(), (4, 4));
    }

    #[tokio::test]
    async fn test_handle_survives_clone() {
        let engine = spawn_engine(RecognizerConfig::default()).unwrap();
        let other = engine.clone();
        other.train(samples()).await.unwrap();
        assert!(engine.describe().await.is_ok());
    }
}
