//! Face Service - request orchestration
//!
//! Decodes images, routes every inference call through the gate and runs
//! batches.

use std::sync::Arc;
use std::time::Instant;

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::provider::{DetectedFace, FaceProvider};

use super::batch::{check_size, run_batch};
use super::error::FaceError;
use super::gate::InferenceGate;
use super::types::*;

/// Standard alphabet with canonical padding; stray bits in the final symbol are ignored
const IMAGE_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Strict standard-alphabet base64 decoding
pub fn decode_base64(image_b64: &str) -> Result<Vec<u8>, FaceError> {
    IMAGE_B64.decode(image_b64).map_err(|_| FaceError::InvalidBase64)
}

pub struct FaceService {
    provider: Option<Arc<dyn FaceProvider>>,
    gate: InferenceGate,
    max_batch_size: usize,
}

impl FaceService {
    /// Create a service; `None` means no provider could be loaded
    pub fn new(provider: Option<Arc<dyn FaceProvider>>, max_batch_size: usize) -> Self {
        Self {
            provider,
            gate: InferenceGate::new(),
            max_batch_size,
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn gate(&self) -> &InferenceGate {
        &self.gate
    }

    fn provider(&self) -> Result<Arc<dyn FaceProvider>, FaceError> {
        self.provider
            .as_ref()
            .filter(|p| p.is_loaded())
            .cloned()
            .ok_or(FaceError::ProviderUnavailable)
    }

    /// Run one operation on raw image bytes through the gate
    pub async fn infer_bytes(
        &self,
        op: Operation,
        image_bytes: Vec<u8>,
    ) -> Result<Vec<DetectedFace>, FaceError> {
        let provider = self.provider()?;
        let start = Instant::now();

        let faces = self
            .gate
            .run(move || op.invoke(provider.as_ref(), &image_bytes))
            .await?
            .map_err(FaceError::Inference)?;

        debug!(
            "{} found {} faces in {}ms",
            op.as_str(),
            faces.len(),
            start.elapsed().as_millis()
        );
        Ok(faces)
    }

    /// Run one operation on a base64 image
    pub async fn infer(&self, op: Operation, image_b64: &str) -> Result<Vec<DetectedFace>, FaceError> {
        self.provider()?;
        let image_bytes = decode_base64(image_b64)?;
        self.infer_bytes(op, image_bytes).await
    }

    async fn infer_owned(&self, op: Operation, image_b64: String) -> Result<Vec<DetectedFace>, FaceError> {
        let image_bytes = decode_base64(&image_b64)?;
        self.infer_bytes(op, image_bytes).await
    }

    pub async fn detect(&self, image_b64: &str) -> Result<Vec<DetectedFace>, FaceError> {
        self.infer(Operation::Detect, image_b64).await
    }

    pub async fn embed(&self, image_b64: &str) -> Result<Vec<DetectedFace>, FaceError> {
        self.infer(Operation::Embed, image_b64).await
    }

    pub async fn analyze(&self, image_b64: &str) -> Result<Vec<DetectedFace>, FaceError> {
        self.infer(Operation::Analyze, image_b64).await
    }

    /// Run a batch, shaping each face with `to_schema`
    pub async fn process_batch<T, S>(
        &self,
        op: Operation,
        images: Vec<String>,
        to_schema: S,
    ) -> Result<BatchResult<T>, FaceError>
    where
        S: Fn(DetectedFace) -> T,
    {
        self.provider()?;
        check_size(images.len(), self.max_batch_size)?;

        let span = info_span!(
            "batch",
            id = %Uuid::new_v4(),
            op = op.as_str(),
            size = images.len()
        );
        run_batch(
            images,
            self.max_batch_size,
            |image_b64| self.infer_owned(op, image_b64),
            to_schema,
        )
        .instrument(span)
        .await
    }

    /// Get health status
    pub fn health(&self) -> HealthResult {
        let provider_loaded = self.provider().is_ok();
        HealthResult {
            healthy: provider_loaded,
            version: env!("CARGO_PKG_VERSION").to_string(),
            provider: self.provider.as_ref().map(|p| p.name().to_string()),
            provider_loaded,
        }
    }
}
