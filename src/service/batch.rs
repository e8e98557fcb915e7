//! Batch orchestration
//!
//! Runs batch items one after another, recording per-item failures instead
//! of failing the whole batch.

use std::future::Future;

use tracing::{debug, error};

use crate::provider::DetectedFace;

use super::error::FaceError;
use super::types::{BatchItem, BatchResult};

/// Per-item message when an error renders as an empty string
const FALLBACK_MESSAGE: &str = "Processing failed";

/// Reject batches larger than `max` before any work starts
pub fn check_size(size: usize, max: usize) -> Result<(), FaceError> {
    if size > max {
        return Err(FaceError::BatchTooLarge { size, max });
    }
    Ok(())
}

/// Process `images` in index order.
///
/// `infer` handles a single base64 image; its failures become the item's
/// `error`, except cancellation, which aborts the batch.
pub async fn run_batch<T, F, Fut, S>(
    images: Vec<String>,
    max_batch_size: usize,
    infer: F,
    to_schema: S,
) -> Result<BatchResult<T>, FaceError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<DetectedFace>, FaceError>>,
    S: Fn(DetectedFace) -> T,
{
    check_size(images.len(), max_batch_size)?;

    let mut results = Vec::with_capacity(images.len());
    let mut total_faces = 0;

    for (index, image_b64) in images.into_iter().enumerate() {
        match infer(image_b64).await {
            Ok(faces) => {
                total_faces += faces.len();
                debug!(index, faces = faces.len(), "Batch item processed");
                results.push(BatchItem::success(
                    index,
                    faces.into_iter().map(&to_schema).collect(),
                ));
            }
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                if !e.is_client_error() {
                    error!(index, error = %e, "Batch image processing failed");
                }
                let mut message = e.to_string();
                if message.is_empty() {
                    message = FALLBACK_MESSAGE.to_string();
                }
                results.push(BatchItem::failure(index, message));
            }
        }
    }

    Ok(BatchResult {
        results,
        total_faces,
    })
}
