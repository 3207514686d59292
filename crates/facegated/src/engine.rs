use facegate_core::detector::DetectorError;
use facegate_core::recognizer::RecognizerError;
use facegate_core::{BoundingBox, Descriptor, FaceDetector, FaceRecognizer, Frame};
use std::future::Future;
use std::path::Path;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("failed to start engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// One face found in a submitted image.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub descriptor: Descriptor,
}

/// The face-matching collaborator as seen by setup and login.
pub trait FaceEngine: Clone + Send + Sync + 'static {
    /// Descriptor of the most confident face in a reference image.
    fn describe_reference(&self, frame: Frame) -> impl Future<Output = Result<Descriptor, EngineError>> + Send;

    /// Every face in a submitted image, each with its descriptor.
    fn detect_all(&self, frame: Frame) -> impl Future<Output = Result<Vec<DetectedFace>, EngineError>> + Send;
}

/// Messages sent to the engine thread.
enum EngineRequest {
    DescribeReference {
        frame: Frame,
        reply: oneshot::Sender<Result<Descriptor, EngineError>>,
    },
    DetectAll {
        frame: Frame,
        reply: oneshot::Sender<Result<Vec<DetectedFace>, EngineError>>,
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
}

impl FaceEngine for EngineHandle {
    async fn describe_reference(&self, frame: Frame) -> Result<Descriptor, EngineError> {
        self.request(|reply| EngineRequest::DescribeReference { frame, reply })
            .await
    }

    async fn detect_all(&self, frame: Frame) -> Result<Vec<DetectedFace>, EngineError> {
        self.request(|reply| EngineRequest::DetectAll { frame, reply }).await
    }
}

/// Load both ONNX models and start the engine on a dedicated OS thread.
///
/// Blocking; fails fast if a model is missing or malformed. Inference is
/// serialized through the request channel.
pub fn spawn_engine(scrfd_path: &Path, arcface_path: &Path) -> Result<EngineHandle, EngineError> {
    let mut models = OnnxModels {
        detector: FaceDetector::load(scrfd_path)?,
        recognizer: FaceRecognizer::load(arcface_path)?,
    };

    let (tx, rx) = mpsc::channel::<EngineRequest>(8);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            serve(rx, &mut models);
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

/// Blocking inference run on the engine thread.
trait Inference {
    fn describe_reference(&mut self, frame: &Frame) -> Result<Descriptor, EngineError>;
    fn detect_all(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, EngineError>;
}

/// Answer requests until every handle is dropped.
///
/// A request whose caller already gave up (timed out or cancelled) is skipped
/// without running inference.
fn serve(mut rx: mpsc::Receiver<EngineRequest>, models: &mut impl Inference) {
    while let Some(req) = rx.blocking_recv() {
        match req {
            EngineRequest::DescribeReference { frame, reply } => {
                if reply.is_closed() {
                    tracing::debug!("skipping abandoned reference request");
                    continue;
                }
                let _ = reply.send(models.describe_reference(&frame));
            }
            EngineRequest::DetectAll { frame, reply } => {
                if reply.is_closed() {
                    tracing::debug!("skipping abandoned detect request");
                    continue;
                }
                let _ = reply.send(models.detect_all(&frame));
            }
        }
    }
}

struct OnnxModels {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl Inference for OnnxModels {
    fn describe_reference(&mut self, frame: &Frame) -> Result<Descriptor, EngineError> {
        let faces = self.detector.detect(frame)?;
        let face = faces.first().ok_or(EngineError::NoFaceDetected)?;
        if faces.len() > 1 {
            tracing::warn!(
                faces = faces.len(),
                "reference image holds several faces; using the most confident"
            );
        }
        Ok(self.recognizer.describe(frame, face)?)
    }

    fn detect_all(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, EngineError> {
        let faces = self.detector.detect(frame)?;
        tracing::debug!(
            faces = faces.len(),
            width = frame.width,
            height = frame.height,
            "detect_all"
        );
        faces
            .into_iter()
            .map(|bbox| {
                let descriptor = self.recognizer.describe(frame, &bbox)?;
                Ok(DetectedFace { bbox, descriptor })
            })
            .collect()
    }
}
