//! Deterministic provider for tests, no model weights required

use std::collections::BTreeMap;

use anyhow::Result;

use super::traits::FaceProvider;
use super::types::{BoundingBox, DetectedFace, Gender, EMBEDDING_DIM};

/// Returns the same single face for every image
#[derive(Debug, Default)]
pub struct StaticProvider {
    loaded: bool,
}

impl StaticProvider {
    pub fn loaded() -> Self {
        Self { loaded: true }
    }

    pub fn face() -> DetectedFace {
        let race_probs = BTreeMap::from([
            ("white".to_string(), 0.8),
            ("black".to_string(), 0.1),
            ("asian".to_string(), 0.1),
        ]);

        DetectedFace {
            bbox: BoundingBox::new(10.0, 20.0, 100.0, 120.0),
            det_score: 0.99,
            embedding: Some(vec![0.1; EMBEDDING_DIM]),
            age: Some(25.0),
            gender: Some(Gender::Male),
            race: Some("white".to_string()),
            race_probs: Some(race_probs),
        }
    }
}

impl FaceProvider for StaticProvider {
    fn load_model(&mut self) -> Result<()> {
        self.loaded = true;
        Ok(())
    }

    fn detect(&self, _image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        Ok(vec![Self::face().detection_only()])
    }

    fn embed(&self, _image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        Ok(vec![Self::face().without_attributes()])
    }

    fn analyze(&self, _image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        Ok(vec![Self::face()])
    }

    fn name(&self) -> &'static str {
        "static"
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Fails every call whose image bytes start with `fail`
#[derive(Debug, Default)]
pub struct FlakyProvider;

impl FlakyProvider {
    fn check(image_bytes: &[u8]) -> Result<()> {
        if image_bytes.starts_with(b"fail") {
            anyhow::bail!("inference exploded");
        }
        if image_bytes.starts_with(b"panic") {
            panic!("inference panicked");
        }
        Ok(())
    }
}

impl FaceProvider for FlakyProvider {
    fn load_model(&mut self) -> Result<()> {
        Ok(())
    }

    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        Self::check(image_bytes)?;
        Ok(vec![StaticProvider::face().detection_only()])
    }

    fn embed(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        Self::check(image_bytes)?;
        Ok(vec![StaticProvider::face().without_attributes()])
    }

    fn analyze(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        Self::check(image_bytes)?;
        Ok(vec![StaticProvider::face()])
    }

    fn name(&self) -> &'static str {
        "flaky"
    }

    fn is_loaded(&self) -> bool {
        true
    }
}
