//! Gender and age head
//!
//! InsightFace `genderage` model: two gender logits (female, male) followed
//! by an age value scaled to `[0, 1]`.

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::debug;

use super::pool::{ModelPool, ModelType};
use super::preprocess::{to_nchw, PixelNorm};
use super::tensor;
use crate::utils::math::argmax;

/// Raw gender/age prediction for one face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenderAge {
    /// Index of the winning gender logit: 0 female, 1 male
    pub sex: i64,
    pub age: f32,
}

impl GenderAge {
    /// Interpret the model output vector
    pub fn from_output(output: &[f32]) -> Result<Self> {
        let [female, male, age, ..] = output else {
            anyhow::bail!("unexpected genderage output length: {}", output.len());
        };
        Ok(Self {
            sex: argmax(&[*female, *male]) as i64,
            age: (age * 100.0).round(),
        })
    }
}

pub struct AttributeAnalyzer<'a> {
    pool: &'a ModelPool,
}

impl<'a> AttributeAnalyzer<'a> {
    pub fn new(pool: &'a ModelPool) -> Self {
        Self { pool }
    }

    /// Whether the pack ships a gender/age model
    pub fn is_available(&self) -> bool {
        self.pool.is_loaded(ModelType::GenderAge)
    }

    /// Predict gender and age from a 96x96 face crop
    pub fn analyze(&self, face_crop: &RgbImage) -> Result<GenderAge> {
        let input = to_nchw(face_crop, PixelNorm::Raw);

        let model = self
            .pool
            .get_model(ModelType::GenderAge)
            .context("genderage model not loaded")?;
        let request = tensor::infer(model, &input)?;

        let output = tensor::read_f32(&request.get_output_tensor()?)?;
        debug!("GenderAge raw output: {:?}", output);
        GenderAge::from_output(&output)
    }
}
