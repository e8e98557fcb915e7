//! Service layer module

pub mod batch;
pub mod error;
pub mod face_service;
pub mod gate;
pub mod types;

pub use error::FaceError;
pub use face_service::FaceService;
pub use gate::{GateError, InferenceGate};
pub use types::*;
