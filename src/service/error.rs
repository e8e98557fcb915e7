//! Face service errors

use thiserror::Error;

use super::gate::GateError;

#[derive(Debug, Error)]
pub enum FaceError {
    #[error("Invalid base64-encoded image")]
    InvalidBase64,

    #[error("Batch size {size} exceeds maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Face provider not initialized")]
    ProviderUnavailable,

    #[error("{0:#}")]
    Inference(anyhow::Error),

    #[error(transparent)]
    Gate(#[from] GateError),
}

impl FaceError {
    /// Errors caused by the request itself
    pub fn is_client_error(&self) -> bool {
        matches!(self, FaceError::InvalidBase64 | FaceError::BatchTooLarge { .. })
    }

    /// Cancellation is never folded into a per-item batch error
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FaceError::Gate(GateError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(FaceError::InvalidBase64.to_string(), "Invalid base64-encoded image");
        assert_eq!(
            FaceError::BatchTooLarge { size: 21, max: 20 }.to_string(),
            "Batch size 21 exceeds maximum of 20"
        );
        let inference = FaceError::Inference(anyhow::anyhow!("bad tensor").context("running detector"));
        assert_eq!(inference.to_string(), "running detector: bad tensor");
    }

    #[test]
    fn test_classification() {
        assert!(FaceError::InvalidBase64.is_client_error());
        assert!(!FaceError::ProviderUnavailable.is_client_error());
        assert!(FaceError::Gate(GateError::Cancelled).is_cancellation());
        assert!(!FaceError::Gate(GateError::Panicked("x".into())).is_cancellation());
    }
}
