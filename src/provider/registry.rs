//! Provider registry
//!
//! Maps a configured provider name to a concrete implementation.

use crate::config::FaceConfig;

use super::insightface::{InsightFaceOptions, InsightFaceProvider};
use super::traits::{FaceProvider, ProviderError};

/// Names accepted by [`create_provider`]
pub const PROVIDER_NAMES: &[&str] = &["insightface"];

/// Build the provider named in the config. The provider is returned unloaded.
pub fn create_provider(config: &FaceConfig) -> Result<Box<dyn FaceProvider>, ProviderError> {
    let name = config.provider.to_lowercase();

    match name.as_str() {
        "insightface" => Ok(Box::new(InsightFaceProvider::new(InsightFaceOptions {
            use_gpu: config.use_gpu,
            ctx_id: config.ctx_id,
            det_size: config.det_size,
            model_name: config.model_name.clone(),
            model_dir: config.resolved_model_dir(),
        }))),
        _ => Err(ProviderError::Unknown(name)),
    }
}
