//! Face records returned by providers

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// Embedding length of the reference recognition model
pub const EMBEDDING_DIM: usize = 512;

/// Axis-aligned face rectangle in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from a corner pair, collapsing inverted edges to zero size
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0.0),
            height: (y2 - y1).max(0.0),
        }
    }
}

/// Gender label attached to an analyzed face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Map an integer sex code: 1 is male, anything else is female.
    pub fn from_sex_code(code: i64) -> Self {
        if code == 1 {
            Gender::Male
        } else {
            Gender::Female
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl Serialize for Gender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A face found by a provider.
///
/// `detect` fills only `bbox` and `det_score`, `embed` adds `embedding`
/// and `analyze` fills whatever demographic attributes the model exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub det_score: f32,
    pub embedding: Option<Vec<f32>>,
    pub age: Option<f32>,
    pub gender: Option<Gender>,
    pub race: Option<String>,
    pub race_probs: Option<BTreeMap<String, f32>>,
}

impl DetectedFace {
    pub fn new(bbox: BoundingBox, det_score: f32) -> Self {
        Self {
            bbox,
            det_score,
            embedding: None,
            age: None,
            gender: None,
            race: None,
            race_probs: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Keep only the detection fields
    pub fn detection_only(&self) -> Self {
        Self::new(self.bbox, self.det_score)
    }

    /// Keep the detection fields and the embedding
    pub fn without_attributes(&self) -> Self {
        Self {
            embedding: self.embedding.clone(),
            ..self.detection_only()
        }
    }
}
