//! Model set loader
//!
//! Compiles every model of a model pack once at startup. Compiled models
//! stay resident for the lifetime of the process.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use openvino::{CompiledModel, Core, InferRequest};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::provider::ProviderError;

/// Compiled model guarded for cross-thread use.
///
/// The Rust bindings need `&mut self` to create infer requests, so access
/// goes through a mutex.
pub struct SafeCompiledModel(Mutex<CompiledModel>);

// SAFETY: OpenVINO compiled models are thread-safe on the C++ side and every
// access from Rust is serialized by the mutex.
unsafe impl Send for SafeCompiledModel {}
unsafe impl Sync for SafeCompiledModel {}

impl SafeCompiledModel {
    /// Create a fresh inference request
    pub fn create_infer_request(&self) -> Result<InferRequest> {
        Ok(self.0.lock().create_infer_request()?)
    }
}

/// Model roles inside a pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Detector,
    Recognizer,
    GenderAge,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Detector => "detector",
            ModelType::Recognizer => "recognizer",
            ModelType::GenderAge => "genderage",
        }
    }
}

/// ONNX files found in a model pack directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
    pub gender_age: Option<PathBuf>,
}

/// Landmark models shipped in packs that this service does not run
const IGNORED_MODELS: [&str; 2] = ["1k3d68", "2d106det"];

impl ModelFiles {
    /// Classify the `.onnx` files of a pack directory by file name
    pub fn discover(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading model directory {}", dir.display()))?;

        let mut onnx: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "onnx"))
            .collect();
        onnx.sort();

        let mut detector = None;
        let mut recognizer = None;
        let mut gender_age = None;

        for path in onnx {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();

            if stem.starts_with("det_") || stem.starts_with("scrfd") {
                detector.get_or_insert(path);
            } else if stem == "genderage" {
                gender_age.get_or_insert(path);
            } else if IGNORED_MODELS.contains(&stem.as_str()) {
                debug!("Skipping unused model {}", path.display());
            } else {
                recognizer.get_or_insert(path);
            }
        }

        Ok(Self {
            detector: detector.ok_or_else(|| {
                ProviderError::ModelNotFound(format!("detector in {}", dir.display()))
            })?,
            recognizer: recognizer.ok_or_else(|| {
                ProviderError::ModelNotFound(format!("recognizer in {}", dir.display()))
            })?,
            gender_age,
        })
    }
}

/// The compiled models of one pack
pub struct ModelPool {
    device: String,
    detector: SafeCompiledModel,
    recognizer: SafeCompiledModel,
    gender_age: Option<SafeCompiledModel>,
}

impl ModelPool {
    /// Compile every model of the pack on the given device
    pub fn load(files: &ModelFiles, device: &str) -> Result<Self> {
        let mut core = Core::new()?;

        let detector = compile(&mut core, ModelType::Detector, &files.detector, device)?;
        let recognizer = compile(&mut core, ModelType::Recognizer, &files.recognizer, device)?;
        let gender_age = files
            .gender_age
            .as_deref()
            .map(|path| compile(&mut core, ModelType::GenderAge, path, device))
            .transpose()?;

        Ok(Self {
            device: device.to_string(),
            detector,
            recognizer,
            gender_age,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Get a loaded model, `None` for optional models missing from the pack
    pub fn get_model(&self, model_type: ModelType) -> Option<&SafeCompiledModel> {
        match model_type {
            ModelType::Detector => Some(&self.detector),
            ModelType::Recognizer => Some(&self.recognizer),
            ModelType::GenderAge => self.gender_age.as_ref(),
        }
    }

    pub fn is_loaded(&self, model_type: ModelType) -> bool {
        self.get_model(model_type).is_some()
    }
}

fn compile(
    core: &mut Core,
    model_type: ModelType,
    path: &Path,
    device: &str,
) -> Result<SafeCompiledModel> {
    info!("Loading model: {} from {}", model_type.as_str(), path.display());
    let start = Instant::now();

    let path_str = path
        .to_str()
        .with_context(|| format!("model path is not valid UTF-8: {}", path.display()))?;
    let model = core
        .read_model_from_file(path_str, "")
        .with_context(|| format!("reading {}", path.display()))?;
    let compiled = core
        .compile_model(&model, device.into())
        .with_context(|| format!("compiling {} for {}", model_type.as_str(), device))?;

    info!("Model {} loaded in {:?}", model_type.as_str(), start.elapsed());
    Ok(SafeCompiledModel(Mutex::new(compiled)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_model_type_as_str() {
        assert_eq!(ModelType::Detector.as_str(), "detector");
        assert_eq!(ModelType::Recognizer.as_str(), "recognizer");
        assert_eq!(ModelType::GenderAge.as_str(), "genderage");
    }

    #[test]
    fn test_discover_buffalo_layout() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "1k3d68.onnx",
            "2d106det.onnx",
            "det_10g.onnx",
            "genderage.onnx",
            "w600k_r50.onnx",
            "README.txt",
        ] {
            touch(dir.path(), name);
        }

        let files = ModelFiles::discover(dir.path()).unwrap();
        assert_eq!(files.detector, dir.path().join("det_10g.onnx"));
        assert_eq!(files.recognizer, dir.path().join("w600k_r50.onnx"));
        assert_eq!(files.gender_age, Some(dir.path().join("genderage.onnx")));
    }

    #[test]
    fn test_discover_without_genderage() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "det_500m.onnx");
        touch(dir.path(), "w600k_mbf.onnx");

        let files = ModelFiles::discover(dir.path()).unwrap();
        assert!(files.gender_age.is_none());
    }

    #[test]
    fn test_discover_missing_detector() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "w600k_r50.onnx");

        let err = ModelFiles::discover(dir.path()).unwrap_err();
        assert!(err.to_string().contains("detector"));
    }

    #[test]
    fn test_discover_missing_directory() {
        assert!(ModelFiles::discover(Path::new("/nonexistent/buffalo_l")).is_err());
    }
}
