//! Inference gate
//!
//! Admits one inference call at a time across the whole process. Calls wait
//! in arrival order and run on the blocking thread pool.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Inference gate is closed")]
    Closed,

    #[error("Inference panicked: {0}")]
    Panicked(String),

    #[error("Inference task was cancelled")]
    Cancelled,
}

/// Capacity-one admission gate in front of the provider.
///
/// The permit moves into the blocking task, so a caller dropped after
/// admission does not free the gate until its inference has finished.
#[derive(Debug, Clone)]
pub struct InferenceGate {
    permits: Arc<Semaphore>,
}

impl InferenceGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// True when no inference is running
    pub fn is_idle(&self) -> bool {
        self.permits.available_permits() == 1
    }

    /// Wait for the gate, then run `f` on the blocking pool
    pub async fn run<F, T>(&self, f: F) -> Result<T, GateError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateError::Closed)?;

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        });

        match task.await {
            Ok(value) => Ok(value),
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                error!("Inference panicked: {}", message);
                Err(GateError::Panicked(message))
            }
            Err(_) => Err(GateError::Cancelled),
        }
    }
}

impl Default for InferenceGate {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_admits_two_calls() {
        let gate = InferenceGate::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                gate.run(move || {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(gate.is_idle());
    }

    #[tokio::test]
    async fn test_returns_value() {
        let gate = InferenceGate::new();
        assert_eq!(gate.run(|| 21 * 2).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_released_after_error() {
        let gate = InferenceGate::new();
        let result: Result<(), anyhow::Error> = gate
            .run(|| Err(anyhow::anyhow!("model failure")))
            .await
            .unwrap();
        assert!(result.is_err());
        assert!(gate.is_idle());
        assert_eq!(gate.run(|| 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_released_after_panic() {
        let gate = InferenceGate::new();
        let err = gate.run(|| -> u32 { panic!("boom") }).await.unwrap_err();
        assert!(matches!(err, GateError::Panicked(ref m) if m == "boom"));
        assert!(gate.is_idle());
        assert_eq!(gate.run(|| 7).await.unwrap(), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_waiter_does_not_wedge_gate() {
        let gate = InferenceGate::new();

        let busy = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.run(|| std::thread::sleep(Duration::from_millis(100))).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Gives up while queued behind the running call
        let waiter = tokio::time::timeout(Duration::from_millis(10), gate.run(|| ())).await;
        assert!(waiter.is_err());

        busy.await.unwrap().unwrap();
        assert_eq!(gate.run(|| "next").await.unwrap(), "next");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_admitted_call_finishes_before_next() {
        let gate = InferenceGate::new();
        let first_done = Arc::new(AtomicBool::new(false));

        let flag = first_done.clone();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            gate.run(move || {
                std::thread::sleep(Duration::from_millis(100));
                flag.store(true, Ordering::SeqCst);
            }),
        )
        .await;
        assert!(abandoned.is_err());

        let flag = first_done.clone();
        let saw_first = gate.run(move || flag.load(Ordering::SeqCst)).await.unwrap();
        assert!(saw_first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queued_calls_run_in_arrival_order() {
        let gate = InferenceGate::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let busy = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.run(|| std::thread::sleep(Duration::from_millis(100))).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut queued = Vec::new();
        for i in 0..3 {
            let gate = gate.clone();
            let order = order.clone();
            queued.push(tokio::spawn(async move {
                gate.run(move || order.lock().push(i)).await
            }));
            // Let this caller reach the queue before the next arrives
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        busy.await.unwrap().unwrap();
        for handle in queued {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }
}
