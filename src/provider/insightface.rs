//! InsightFace model pack provider
//!
//! Runs a `buffalo_*` style model pack (SCRFD detector, ArcFace recognizer,
//! gender/age head) through the OpenVINO engine.

use std::path::PathBuf;

use anyhow::Result;
use image::DynamicImage;
use tracing::{debug, info};

use crate::engine::preprocess::{align_face, crop_face, decode_image, GENDER_AGE_INPUT_SIZE};
use crate::engine::{AttributeAnalyzer, FaceBox, FaceDetector, FaceEmbedder, ModelFiles, ModelPool};

use super::traits::{FaceProvider, ProviderError};
use super::types::{BoundingBox, DetectedFace, Gender};

/// Crop enlargement around the box for the gender/age head
const GENDER_AGE_EXPAND: f32 = 1.5;

/// How much of each face to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Detect,
    Embed,
    Analyze,
}

#[derive(Debug, Clone)]
pub struct InsightFaceOptions {
    pub use_gpu: bool,
    pub ctx_id: i32,
    pub det_size: (u32, u32),
    pub model_name: String,
    pub model_dir: PathBuf,
}

impl Default for InsightFaceOptions {
    fn default() -> Self {
        Self {
            use_gpu: false,
            ctx_id: 0,
            det_size: (640, 640),
            model_name: "buffalo_l".to_string(),
            model_dir: PathBuf::from("~/.insightface"),
        }
    }
}

pub struct InsightFaceProvider {
    options: InsightFaceOptions,
    models: Option<ModelPool>,
}

impl InsightFaceProvider {
    pub fn new(options: InsightFaceOptions) -> Self {
        Self {
            options,
            models: None,
        }
    }

    pub fn options(&self) -> &InsightFaceOptions {
        &self.options
    }

    /// OpenVINO device name for the configured hardware
    pub fn device(&self) -> String {
        if self.options.use_gpu {
            format!("GPU.{}", self.options.ctx_id)
        } else {
            "CPU".to_string()
        }
    }

    /// Directory holding the pack's ONNX files
    pub fn pack_dir(&self) -> PathBuf {
        self.options
            .model_dir
            .join("models")
            .join(&self.options.model_name)
    }

    fn models(&self) -> Result<&ModelPool> {
        self.models
            .as_ref()
            .ok_or_else(|| ProviderError::NotLoaded(self.name()).into())
    }

    fn run(&self, image_bytes: &[u8], depth: Depth) -> Result<Vec<DetectedFace>> {
        let models = self.models()?;

        let image = match decode_image(image_bytes) {
            Ok(image) => image,
            Err(e) => {
                debug!("Image could not be decoded, reporting no faces: {}", e);
                return Ok(Vec::new());
            }
        };

        let boxes = FaceDetector::new(models, self.options.det_size).detect(&image)?;
        if depth == Depth::Detect {
            return Ok(boxes.iter().map(detection).collect());
        }

        let rgb = image.to_rgb8();
        let embedder = FaceEmbedder::new(models);
        let attributes = AttributeAnalyzer::new(models);

        boxes
            .iter()
            .map(|face_box| -> Result<DetectedFace> {
                let mut face = detection(face_box);
                if let Some(landmarks) = &face_box.landmarks {
                    let aligned = align_face(&rgb, landmarks);
                    face.embedding = Some(embedder.embed(&aligned)?);
                }
                if depth == Depth::Analyze && attributes.is_available() {
                    analyze_attributes(&attributes, &image, face_box, &mut face)?;
                }
                Ok(face)
            })
            .collect()
    }
}

fn detection(face_box: &FaceBox) -> DetectedFace {
    let (x1, y1, x2, y2) = face_box.corners();
    DetectedFace::new(BoundingBox::from_corners(x1, y1, x2, y2), face_box.score)
}

fn analyze_attributes(
    analyzer: &AttributeAnalyzer<'_>,
    image: &DynamicImage,
    face_box: &FaceBox,
    face: &mut DetectedFace,
) -> Result<()> {
    let crop = crop_face(image, face_box.corners(), GENDER_AGE_EXPAND, GENDER_AGE_INPUT_SIZE);
    let prediction = analyzer.analyze(&crop)?;
    face.age = Some(prediction.age);
    face.gender = Some(Gender::from_sex_code(prediction.sex));
    Ok(())
}

impl FaceProvider for InsightFaceProvider {
    fn load_model(&mut self) -> Result<()> {
        let dir = self.pack_dir();
        let device = self.device();
        info!("Loading InsightFace pack {} on {}", dir.display(), device);

        let (w, h) = self.options.det_size;
        anyhow::ensure!(
            w > 0 && h > 0,
            "det_size must have a non-zero width and height, got {}x{}",
            w,
            h
        );

        let files = ModelFiles::discover(&dir)?;
        self.models = Some(ModelPool::load(&files, &device)?);
        Ok(())
    }

    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        self.run(image_bytes, Depth::Detect)
    }

    fn embed(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        self.run(image_bytes, Depth::Embed)
    }

    fn analyze(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        self.run(image_bytes, Depth::Analyze)
    }

    fn name(&self) -> &'static str {
        "insightface"
    }

    fn is_loaded(&self) -> bool {
        self.models.is_some()
    }
}
