//! Face provider abstraction
//!
//! Defines the capability interface for face inference backends.
//! Implementations are swapped by name through the registry.

use anyhow::Result;
use thiserror::Error;

use super::types::DetectedFace;

/// Errors raised by providers and the registry
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown face provider: {0:?}")]
    Unknown(String),

    #[error("Face provider {0} has not been loaded")]
    NotLoaded(&'static str),

    #[error("Model file not found: {0}")]
    ModelNotFound(String),
}

/// Face inference provider.
///
/// A provider is loaded once with [`FaceProvider::load_model`] and then
/// shared read-only; the inference calls take `&self` and are blocking.
/// Input that cannot be decoded as an image yields an empty list.
pub trait FaceProvider: Send + Sync + 'static {
    /// Read model weights into memory. Called once at startup.
    fn load_model(&mut self) -> Result<()>;

    /// Faces with bounding boxes and detection scores only
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>>;

    /// Faces with bounding boxes and embedding vectors
    fn embed(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>>;

    /// Faces with bounding boxes, embeddings and demographics
    fn analyze(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>>;

    /// Registry name of the provider
    fn name(&self) -> &'static str;

    fn is_loaded(&self) -> bool;
}
