//! ArcFace face embedder
//!
//! Runs the recognition model of the pack on 112x112 aligned faces and
//! returns L2-normalized feature vectors.

use anyhow::{Context, Result};
use image::RgbImage;

use super::pool::{ModelPool, ModelType};
use super::preprocess::{to_nchw, PixelNorm};
use super::tensor;
use crate::utils::math::l2_normalize;

pub struct FaceEmbedder<'a> {
    pool: &'a ModelPool,
}

impl<'a> FaceEmbedder<'a> {
    pub fn new(pool: &'a ModelPool) -> Self {
        Self { pool }
    }

    /// Embed an aligned face crop
    pub fn embed(&self, aligned_face: &RgbImage) -> Result<Vec<f32>> {
        let input = to_nchw(aligned_face, PixelNorm::Centered);

        let model = self
            .pool
            .get_model(ModelType::Recognizer)
            .context("recognizer model not loaded")?;
        let request = tensor::infer(model, &input)?;

        let mut vector = tensor::read_f32(&request.get_output_tensor()?)?;
        if vector.is_empty() {
            anyhow::bail!("recognizer returned an empty embedding");
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}
