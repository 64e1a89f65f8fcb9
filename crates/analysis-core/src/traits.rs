use async_trait::async_trait;
use std::sync::Arc;

use crate::{AnalysisError, PriceSeries};

/// Source of daily price history for a single ticker.
///
/// Implementations return a row-aligned, null-free series or a
/// `FetchFailure` describing why no usable data came back.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries, AnalysisError>;
}

#[async_trait]
impl<T: PriceHistoryProvider + ?Sized> PriceHistoryProvider for Arc<T> {
    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries, AnalysisError> {
        (**self).fetch_daily(ticker).await
    }
}
