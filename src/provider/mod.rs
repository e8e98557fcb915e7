//! Face inference providers

pub mod insightface;
pub mod registry;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod fixture;

pub use insightface::InsightFaceProvider;
pub use registry::create_provider;
pub use traits::{FaceProvider, ProviderError};
pub use types::{BoundingBox, DetectedFace, Gender, EMBEDDING_DIM};
