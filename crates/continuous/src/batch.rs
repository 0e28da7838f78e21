//! Parallel product builds.
//!
//! Independent product requests share nothing mutable, so they run on
//! blocking tasks bounded by a semaphore sized to the raw bar source's I/O
//! concurrency.

use std::sync::Arc;

use contfut_core::{Error, Result};
use contfut_ingestion::{RawBarSource, SpecRegistry};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::builder::{BuildReport, BuildRequest, ContinuousContractBuilder};

/// Build every request with at most `workers` running at once.
///
/// Results are returned in request order.
pub async fn build_batch<S, R>(
    builder: Arc<ContinuousContractBuilder<S, R>>,
    requests: Vec<BuildRequest>,
    workers: usize,
) -> Vec<Result<BuildReport>>
where
    S: RawBarSource + 'static,
    R: SpecRegistry + 'static,
{
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let total = requests.len();

    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let builder = Arc::clone(&builder);
            let permits = Arc::clone(&permits);
            tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Other(format!("worker pool closed: {e}")))?;
                debug!(product = %request.product, "build started");
                tokio::task::spawn_blocking(move || builder.build(&request))
                    .await
                    .map_err(|e| Error::Other(format!("build task failed: {e}")))?
            })
        })
        .collect();

    let mut results = Vec::with_capacity(total);
    for handle in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Other(format!("build task failed: {e}"))),
        };
        results.push(result);
    }

    info!(
        requests = total,
        failed = results.iter().filter(|r| r.is_err()).count(),
        "batch finished"
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{flat_source, range_bounds, registry};
    use contfut_core::DateRange;

    fn request(product: &str) -> BuildRequest {
        let (start, end) = range_bounds();
        BuildRequest::new(product, DateRange::new(start, end).unwrap())
    }

    #[tokio::test]
    async fn test_batch_preserves_request_order() {
        let builder = Arc::new(ContinuousContractBuilder::new(flat_source(), registry()));
        let requests = vec![request("ES"), request("XX"), request("ES")];

        let results = build_batch(Arc::clone(&builder), requests, 2).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().product, "ES");
        assert!(matches!(results[1], Err(Error::UnknownContract(_))));

        let a = serde_json::to_string(results[0].as_ref().unwrap().series(0).unwrap()).unwrap();
        let b = serde_json::to_string(results[2].as_ref().unwrap().series(0).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_zero_workers_still_runs() {
        let builder = Arc::new(ContinuousContractBuilder::new(flat_source(), registry()));
        let results = build_batch(builder, vec![request("ES")], 0).await;
        assert!(results[0].is_ok());
    }
}
