//! Scoped store access and request lifecycle.
//!
//! Every request owns exactly one [`Session`]: a pool permit plus a store
//! reference. The pool bounds how many requests may be mid-flight against
//! the store at once; requests beyond that bound queue at `open()` time,
//! not inside the resolution pipeline. Dropping a session (on any exit
//! path, including cancellation at an await point) releases the permit.

use std::future::Future;
use std::sync::Arc;

use ortelius_gazetteer::{GazetteerStore, StoreError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::PoolConfig,
    error::{OrteliusError, Result},
    results::{Health, StatusReport},
};

/// Pooled, process-wide access to one gazetteer store.
pub struct SessionPool {
    store: Arc<dyn GazetteerStore>,
    permits: Arc<Semaphore>,
    config: PoolConfig,
    warmed: tokio::sync::OnceCell<()>,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("max_sessions", &self.config.max_sessions)
            .field("available", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl SessionPool {
    pub fn new(store: Arc<dyn GazetteerStore>, config: PoolConfig) -> Self {
        Self {
            store,
            permits: Arc::new(Semaphore::new(config.max_sessions)),
            config,
            warmed: tokio::sync::OnceCell::new(),
        }
    }

    /// Process-wide warm-up: verify the store answers and carries data.
    /// Runs the check once per pool lifetime; later calls are free.
    #[instrument(level = "info", skip_all)]
    pub async fn warm_up(&self) -> Result<()> {
        self.warmed
            .get_or_try_init(|| async {
                let stats = self.store.stats().await?;
                if stats.version.is_empty() {
                    return Err(OrteliusError::Config(
                        "store reports an empty data version".into(),
                    ));
                }
                info!(
                    version = %stats.version,
                    features = stats.feature_count,
                    "store warmed up"
                );
                Ok(())
            })
            .await
            .map(|()| ())
    }

    /// Stop handing out sessions. In-flight sessions finish normally.
    pub fn shut_down(&self) {
        self.permits.close();
        info!("session pool shut down");
    }

    /// Acquire a session, queueing when the pool is exhausted.
    pub async fn open(&self) -> Result<Session> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| {
                OrteliusError::Store(StoreError::Unavailable("session pool is shut down".into()))
            })?;
        debug!(available = self.permits.available_permits(), "session opened");
        Ok(Session {
            store: Arc::clone(&self.store),
            config: self.config,
            _permit: permit,
        })
    }

    /// Lightweight liveness check against the store.
    ///
    /// A reachable store with no data reports `Degraded` rather than
    /// failing; an unreachable store surfaces a store error (after the
    /// usual single retry).
    #[instrument(level = "debug", skip_all)]
    pub async fn status(&self) -> Result<StatusReport> {
        let session = self.open().await?;
        let stats = match session.run("status", self.store.stats()).await {
            Ok(stats) => stats,
            Err(err) if err.is_transient() => {
                warn!(error = %err, "status check failed, retrying once");
                session.run("status-retry", self.store.stats()).await?
            }
            Err(err) => return Err(err),
        };
        let health = if stats.feature_count == 0 {
            Health::Degraded
        } else {
            Health::Ok
        };
        Ok(StatusReport {
            health,
            store_version: stats.version,
            feature_count: stats.feature_count,
        })
    }
}

/// One request's scoped store handle.
///
/// Never shared across concurrent requests and carries no cross-request
/// state. The permit is released when the session drops.
pub struct Session {
    store: Arc<dyn GazetteerStore>,
    config: PoolConfig,
    _permit: OwnedSemaphorePermit,
}

impl Session {
    pub(crate) fn store(&self) -> &dyn GazetteerStore {
        self.store.as_ref()
    }

    /// Run one store operation under the per-operation timeout, mapping
    /// elapsed time to a `StoreTimeout` fault.
    pub(crate) async fn run<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = ortelius_gazetteer::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(result) => result.map_err(OrteliusError::Store),
            Err(_) => Err(OrteliusError::Store(StoreError::Timeout(
                operation.to_owned(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ortelius_gazetteer::{
        ContainmentEdge, Feature, FeatureId, LatLon, NearbyHit, StoreStats, TextHit, TokenQuery,
        test_data::{TestDataConfig, example_country_store},
    };

    use super::*;

    /// Store that always reports unavailable.
    #[derive(Debug, Default)]
    struct FailingStore;

    #[async_trait::async_trait]
    impl GazetteerStore for FailingStore {
        async fn stats(&self) -> ortelius_gazetteer::Result<StoreStats> {
            Err(StoreError::Unavailable("down for tests".into()))
        }
        async fn feature(&self, _id: FeatureId) -> ortelius_gazetteer::Result<Option<Feature>> {
            Err(StoreError::Unavailable("down for tests".into()))
        }
        async fn features(&self, _ids: &[FeatureId]) -> ortelius_gazetteer::Result<Vec<Feature>> {
            Err(StoreError::Unavailable("down for tests".into()))
        }
        async fn search_tokens(
            &self,
            _query: &TokenQuery,
        ) -> ortelius_gazetteer::Result<Vec<TextHit>> {
            Err(StoreError::Unavailable("down for tests".into()))
        }
        async fn containing(
            &self,
            _point: LatLon,
            _min_rank: u8,
            _max_rank: u8,
        ) -> ortelius_gazetteer::Result<Vec<Feature>> {
            Err(StoreError::Unavailable("down for tests".into()))
        }
        async fn nearest(
            &self,
            _point: LatLon,
            _radius_m: f64,
            _max_rank: u8,
            _limit: usize,
        ) -> ortelius_gazetteer::Result<Vec<NearbyHit>> {
            Err(StoreError::Unavailable("down for tests".into()))
        }
        async fn parents(
            &self,
            _id: FeatureId,
        ) -> ortelius_gazetteer::Result<Vec<ContainmentEdge>> {
            Err(StoreError::Unavailable("down for tests".into()))
        }
    }

    /// Store whose `stats` fails once, then succeeds.
    #[derive(Debug, Default)]
    struct FlakyStore {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl GazetteerStore for FlakyStore {
        async fn stats(&self) -> ortelius_gazetteer::Result<StoreStats> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::Unavailable("first call fails".into()))
            } else {
                Ok(StoreStats {
                    version: "flaky-1".into(),
                    feature_count: 7,
                })
            }
        }
        async fn feature(&self, _id: FeatureId) -> ortelius_gazetteer::Result<Option<Feature>> {
            Ok(None)
        }
        async fn features(&self, _ids: &[FeatureId]) -> ortelius_gazetteer::Result<Vec<Feature>> {
            Ok(Vec::new())
        }
        async fn search_tokens(
            &self,
            _query: &TokenQuery,
        ) -> ortelius_gazetteer::Result<Vec<TextHit>> {
            Ok(Vec::new())
        }
        async fn containing(
            &self,
            _point: LatLon,
            _min_rank: u8,
            _max_rank: u8,
        ) -> ortelius_gazetteer::Result<Vec<Feature>> {
            Ok(Vec::new())
        }
        async fn nearest(
            &self,
            _point: LatLon,
            _radius_m: f64,
            _max_rank: u8,
            _limit: usize,
        ) -> ortelius_gazetteer::Result<Vec<NearbyHit>> {
            Ok(Vec::new())
        }
        async fn parents(
            &self,
            _id: FeatureId,
        ) -> ortelius_gazetteer::Result<Vec<ContainmentEdge>> {
            Ok(Vec::new())
        }
    }

    fn fixture_pool() -> SessionPool {
        let store = example_country_store(&TestDataConfig::minimal()).unwrap();
        SessionPool::new(Arc::new(store), PoolConfig::default())
    }

    #[tokio::test]
    async fn status_reports_ok_for_populated_store() {
        let pool = fixture_pool();
        let report = pool.status().await.unwrap();
        assert_eq!(report.health, Health::Ok);
        assert_eq!(report.feature_count, 4);
        assert_eq!(report.store_version, "fixture-1");
    }

    #[tokio::test]
    async fn status_retries_transient_failure_once() {
        let pool = SessionPool::new(Arc::new(FlakyStore::default()), PoolConfig::default());
        let report = pool.status().await.unwrap();
        assert_eq!(report.health, Health::Ok);
        assert_eq!(report.store_version, "flaky-1");
    }

    #[tokio::test]
    async fn status_surfaces_persistent_failure() {
        let pool = SessionPool::new(Arc::new(FailingStore), PoolConfig::default());
        let err = pool.status().await.unwrap_err();
        assert!(matches!(err, OrteliusError::Store(_)));
    }

    #[tokio::test]
    async fn pool_bounds_concurrent_sessions() {
        let store = example_country_store(&TestDataConfig::minimal()).unwrap();
        let pool = SessionPool::new(
            Arc::new(store),
            PoolConfig {
                max_sessions: 1,
                ..PoolConfig::default()
            },
        );

        let first = pool.open().await.unwrap();
        // Second open must queue until the first session drops.
        let second = tokio::time::timeout(std::time::Duration::from_millis(50), pool.open()).await;
        assert!(second.is_err(), "second session should still be queued");

        drop(first);
        let third = tokio::time::timeout(std::time::Duration::from_millis(50), pool.open()).await;
        assert!(third.is_ok(), "permit should be released on drop");
    }

    #[tokio::test]
    async fn shut_down_pool_rejects_new_sessions() {
        let pool = fixture_pool();
        pool.shut_down();
        assert!(pool.open().await.is_err());
    }

    #[tokio::test]
    async fn warm_up_runs_once() {
        let pool = fixture_pool();
        pool.warm_up().await.unwrap();
        pool.warm_up().await.unwrap();
    }
}
