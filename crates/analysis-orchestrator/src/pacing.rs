use async_trait::async_trait;
use std::time::Duration;

/// Waits out the settling interval between two upstream requests.
///
/// Injected into the scanner so tests can swap in a clock that records
/// pauses instead of sleeping.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, interval: Duration);
}

/// Real delay on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        tracing::debug!("Pacing: waiting {:.1}s before next request", interval.as_secs_f64());
        tokio::time::sleep(interval).await;
    }
}
