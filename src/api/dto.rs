//! REST API request/response data transfer objects

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::{BoundingBox, DetectedFace, Gender};
use crate::service::BatchResult;

/// Single-image request
#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub image_b64: String,
}

/// Multi-image request
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub images: Vec<ImageRequest>,
}

impl BatchRequest {
    pub fn into_images(self) -> Vec<String> {
        self.images.into_iter().map(|i| i.image_b64).collect()
    }
}

/// Face returned by `/faces/detect`
#[derive(Debug, Serialize)]
pub struct DetectFaceDto {
    pub bbox: BoundingBox,
    pub det_score: f32,
}

/// Face returned by `/faces/embed`
#[derive(Debug, Serialize)]
pub struct EmbedFaceDto {
    pub bbox: BoundingBox,
    pub det_score: f32,
    pub embedding: Vec<f32>,
}

/// Face returned by `/faces/analyze`; unknown attributes serialize as null
#[derive(Debug, Serialize)]
pub struct AnalyzeFaceDto {
    pub bbox: BoundingBox,
    pub det_score: f32,
    pub embedding: Vec<f32>,
    pub age: Option<f32>,
    pub gender: Option<Gender>,
    pub race: Option<String>,
    pub race_probs: Option<BTreeMap<String, f32>>,
}

impl From<DetectedFace> for DetectFaceDto {
    fn from(face: DetectedFace) -> Self {
        Self {
            bbox: face.bbox,
            det_score: face.det_score,
        }
    }
}

impl From<DetectedFace> for EmbedFaceDto {
    fn from(face: DetectedFace) -> Self {
        Self {
            bbox: face.bbox,
            det_score: face.det_score,
            embedding: face.embedding.unwrap_or_default(),
        }
    }
}

impl From<DetectedFace> for AnalyzeFaceDto {
    fn from(face: DetectedFace) -> Self {
        Self {
            bbox: face.bbox,
            det_score: face.det_score,
            embedding: face.embedding.unwrap_or_default(),
            age: face.age,
            gender: face.gender,
            race: face.race,
            race_probs: face.race_probs,
        }
    }
}

/// Single-image response
#[derive(Debug, Serialize)]
pub struct FacesResponse<T> {
    pub faces: Vec<T>,
    pub face_count: usize,
}

impl<T: From<DetectedFace>> FacesResponse<T> {
    pub fn from_faces(faces: Vec<DetectedFace>) -> Self {
        let faces: Vec<T> = faces.into_iter().map(T::from).collect();
        Self {
            face_count: faces.len(),
            faces,
        }
    }
}

pub type DetectResponse = FacesResponse<DetectFaceDto>;
pub type EmbedResponse = FacesResponse<EmbedFaceDto>;
pub type AnalyzeResponse = FacesResponse<AnalyzeFaceDto>;

pub type DetectBatchResponse = BatchResult<DetectFaceDto>;
pub type EmbedBatchResponse = BatchResult<EmbedFaceDto>;
pub type AnalyzeBatchResponse = BatchResult<AnalyzeFaceDto>;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: Option<String>,
    pub provider_loaded: bool,
    pub uptime_seconds: u64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}
