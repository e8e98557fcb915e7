//! OpenVINO inference engine for InsightFace model packs
//!
//! - Model packs compiled once at startup
//! - SCRFD detection, ArcFace embedding, gender/age head
//! - Blocking calls; callers serialize access

pub mod attribute;
pub mod detector;
pub mod embedder;
pub mod pool;
pub mod preprocess;
pub mod tensor;

pub use attribute::{AttributeAnalyzer, GenderAge};
pub use detector::{FaceBox, FaceDetector};
pub use embedder::FaceEmbedder;
pub use pool::{ModelFiles, ModelPool, ModelType};
