//! Service layer types

use serde::Serialize;

use crate::provider::{DetectedFace, FaceProvider};

/// Inference operation requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Detect,
    Embed,
    Analyze,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Detect => "detect",
            Operation::Embed => "embed",
            Operation::Analyze => "analyze",
        }
    }

    /// Run the matching provider call
    pub fn invoke(self, provider: &dyn FaceProvider, image_bytes: &[u8]) -> anyhow::Result<Vec<DetectedFace>> {
        match self {
            Operation::Detect => provider.detect(image_bytes),
            Operation::Embed => provider.embed(image_bytes),
            Operation::Analyze => provider.analyze(image_bytes),
        }
    }
}

/// Outcome of one batch item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem<T> {
    pub index: usize,
    pub faces: Vec<T>,
    pub face_count: usize,
    pub error: Option<String>,
}

impl<T> BatchItem<T> {
    pub fn success(index: usize, faces: Vec<T>) -> Self {
        Self {
            index,
            face_count: faces.len(),
            faces,
            error: None,
        }
    }

    pub fn failure(index: usize, error: String) -> Self {
        Self {
            index,
            faces: Vec::new(),
            face_count: 0,
            error: Some(error),
        }
    }
}

/// Whole batch outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult<T> {
    pub results: Vec<BatchItem<T>>,
    pub total_faces: usize,
}

/// Health check result
#[derive(Debug, Clone, Serialize)]
pub struct HealthResult {
    pub healthy: bool,
    pub version: String,
    pub provider: Option<String>,
    pub provider_loaded: bool,
}
