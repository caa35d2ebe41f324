//! Bounded pool of lazily constructed resources for one provider configuration

use crate::builder::{ResourceBuilder, ServiceRegistration};
use crate::config::{ProviderConfiguration, ServiceType};
use crate::errors::{PoolError, PoolResult};
use crate::handle::{ResourceHandle, ReturnFn};
use crate::hooks::{
    BuildOptions, HookChain, PostConstructionHook, PreConstructionHook,
    ScopedPostConstructionHook, ScopedPreConstructionHook,
};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, PoolMetrics};

use crossbeam::queue::ArrayQueue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

type IdleEntry<R> = (R, Arc<ProviderConfiguration>);

/// Pool of resources for a single provider configuration.
///
/// At most `instance_count` resources are held by callers at any time. Resources
/// are built on demand the first time no idle one is available, and are reused
/// for the lifetime of the pool.
pub struct ResourcePool<B: ResourceBuilder> {
    config: Arc<ProviderConfiguration>,
    idle: Arc<ArrayQueue<IdleEntry<B::Resource>>>,
    semaphore: Arc<Semaphore>,
    next_instance: AtomicUsize,
    hooks: HookChain<B>,
    service: Arc<dyn ServiceRegistration<B>>,
    metrics: Arc<MetricsTracker>,
}

impl<B: ResourceBuilder> ResourcePool<B> {
    /// Create a pool for `config`, using `service` to register the provider's
    /// default service on each new builder.
    pub fn new(
        config: ProviderConfiguration,
        service: Arc<dyn ServiceRegistration<B>>,
    ) -> PoolResult<Self> {
        config.validate()?;
        let capacity = config.instance_count;

        Ok(Self {
            config: Arc::new(config),
            idle: Arc::new(ArrayQueue::new(capacity)),
            semaphore: Arc::new(Semaphore::new(capacity)),
            next_instance: AtomicUsize::new(0),
            hooks: HookChain::new(),
            service,
            metrics: Arc::new(MetricsTracker::new()),
        })
    }

    /// Acquire a resource, waiting up to the configured `max_wait` for a free slot.
    ///
    /// An idle resource is preferred; otherwise a new one is constructed. If the
    /// construction fails, the slot is given back before the error is returned.
    pub async fn acquire(&self) -> PoolResult<ResourceHandle<B::Resource>> {
        let started = Instant::now();
        debug!(pool = %self.config.unique_name, "waiting for a resource");

        let permit = match tokio::time::timeout(self.config.max_wait, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Cancelled),
            Err(_) => {
                let waited = started.elapsed();
                self.metrics.exhausted_events.fetch_add(1, Ordering::Relaxed);
                error!(
                    pool = %self.config.unique_name,
                    waited_ms = waited.as_millis() as u64,
                    idle = self.idle.len(),
                    "no resource available after waiting"
                );
                return Err(PoolError::PoolExhausted {
                    unique_name: self.config.unique_name.clone(),
                    waited,
                });
            }
        };

        debug!(
            pool = %self.config.unique_name,
            waited_ms = started.elapsed().as_millis() as u64,
            idle = self.idle.len(),
            "slot available"
        );

        let (resource, instance_config) = match self.idle.pop() {
            Some(entry) => entry,
            None => self.construct().await?,
        };

        // The slot now travels with the handle and comes back on release.
        permit.forget();
        self.metrics.record_acquired();

        Ok(ResourceHandle::new(resource, instance_config, self.make_return_fn()))
    }

    async fn construct(&self) -> PoolResult<IdleEntry<B::Resource>> {
        let index = self.next_instance.fetch_add(1, Ordering::Relaxed);
        let instance_config = self.config.for_instance(index);

        let mut builder = B::default();
        let mut options = BuildOptions::default();
        self.hooks.run_pre(&mut builder, &instance_config, &mut options);

        if options.auto_register_service {
            if let Err(e) = self
                .service
                .register_service(&mut builder, &instance_config, options.transport.take())
                .await
            {
                self.metrics.construction_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    pool = %self.config.unique_name,
                    instance = %instance_config.unique_name,
                    error = %e,
                    "resource construction failed"
                );
                return Err(PoolError::construction(&instance_config.unique_name, e));
            }
        }

        let mut resource = builder.build();
        self.hooks.run_post(&mut resource, &instance_config);

        let constructed = self.metrics.total_constructed.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            pool = %self.config.unique_name,
            instance = %instance_config.unique_name,
            constructed,
            "resource created"
        );

        Ok((resource, Arc::new(instance_config)))
    }

    fn make_return_fn(&self) -> ReturnFn<B::Resource> {
        let idle = Arc::clone(&self.idle);
        let semaphore = Arc::clone(&self.semaphore);
        let metrics = Arc::clone(&self.metrics);
        let pool = Arc::clone(&self.config);

        Arc::new(move |resource, instance_config, held_for| {
            if idle.push((resource, instance_config)).is_err() {
                // More resources than slots; the surplus one is dropped.
                warn!(pool = %pool.unique_name, "idle list full, dropping returned resource");
            }
            metrics.record_released();
            semaphore.add_permits(1);

            info!(
                pool = %pool.unique_name,
                usage_ms = held_for.as_millis() as u64,
                idle = idle.len(),
                "resource returned"
            );
        })
    }

    /// Register a hook run on every future builder before the default service
    pub fn register_for_pre_construction<F>(&self, hook: F)
    where
        F: Fn(&mut B, &ProviderConfiguration, &mut BuildOptions<B::Transport>) + Send + Sync + 'static,
    {
        self.add_pre_hook(Arc::new(hook));
    }

    /// Register a pre-construction hook that only runs when this pool advertises `scope`.
    /// The hook receives the configuration's full scope list.
    pub fn register_for_pre_construction_in_scope<F>(&self, scope: impl Into<String>, hook: F)
    where
        F: Fn(&mut B, &ProviderConfiguration, &mut BuildOptions<B::Transport>, &[String])
            + Send
            + Sync
            + 'static,
    {
        self.add_scoped_pre_hook(scope.into(), Arc::new(hook));
    }

    /// Register a hook run on every future resource right after it is built
    pub fn register_for_post_construction<F>(&self, hook: F)
    where
        F: Fn(&mut B::Resource, &ProviderConfiguration) + Send + Sync + 'static,
    {
        self.add_post_hook(Arc::new(hook));
    }

    pub fn register_for_post_construction_in_scope<F>(&self, scope: impl Into<String>, hook: F)
    where
        F: Fn(&mut B::Resource, &ProviderConfiguration, &[String]) + Send + Sync + 'static,
    {
        self.add_scoped_post_hook(scope.into(), Arc::new(hook));
    }

    pub(crate) fn add_pre_hook(&self, hook: PreConstructionHook<B>) {
        self.hooks.push_pre(hook);
        debug!(pool = %self.config.unique_name, "pre-construction hook registered");
    }

    pub(crate) fn add_scoped_pre_hook(&self, scope: String, hook: ScopedPreConstructionHook<B>) {
        debug!(pool = %self.config.unique_name, %scope, "scoped pre-construction hook registered");
        self.hooks.push_scoped_pre(scope, hook);
    }

    pub(crate) fn add_post_hook(&self, hook: PostConstructionHook<B::Resource>) {
        self.hooks.push_post(hook);
        debug!(pool = %self.config.unique_name, "post-construction hook registered");
    }

    pub(crate) fn add_scoped_post_hook(
        &self,
        scope: String,
        hook: ScopedPostConstructionHook<B::Resource>,
    ) {
        debug!(pool = %self.config.unique_name, %scope, "scoped post-construction hook registered");
        self.hooks.push_scoped_post(scope, hook);
    }

    /// The provider configuration this pool was created for
    pub fn configuration(&self) -> &ProviderConfiguration {
        &self.config
    }

    pub fn unique_name(&self) -> &str {
        &self.config.unique_name
    }

    pub fn service_type(&self) -> ServiceType {
        self.config.service_type()
    }

    /// Number of registered (pre, post) construction hooks
    pub fn hook_count(&self) -> (usize, usize) {
        self.hooks.len()
    }

    /// Get available count
    pub fn available_count(&self) -> usize {
        self.idle.len()
    }

    /// Get active count
    pub fn active_count(&self) -> usize {
        self.metrics.active.load(Ordering::Relaxed)
    }

    /// Resources constructed so far
    pub fn constructed_count(&self) -> usize {
        self.metrics.total_constructed.load(Ordering::Relaxed)
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.metrics
            .get_metrics(self.idle.len(), self.config.instance_count)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        let pools = [(self.config.unique_name.clone(), self.get_metrics())];
        MetricsExporter::export_prometheus(&pools, tags)
    }
}

impl<B: ResourceBuilder> std::fmt::Debug for ResourcePool<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("unique_name", &self.config.unique_name)
            .field("service_type", &self.config.service_type())
            .field("metrics", &self.get_metrics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingService, TestBuilder, test_config};
    use std::time::Duration;

    fn pool(instance_count: usize) -> (ResourcePool<TestBuilder>, Arc<RecordingService>) {
        let service = Arc::new(RecordingService::default());
        let pool = ResourcePool::new(
            test_config("openai", instance_count),
            Arc::clone(&service) as Arc<dyn ServiceRegistration<TestBuilder>>,
        )
        .unwrap();
        (pool, service)
    }

    #[test]
    fn test_rejects_zero_instances() {
        let service: Arc<dyn ServiceRegistration<TestBuilder>> = Arc::new(RecordingService::default());
        let result = ResourcePool::new(test_config("openai", 0), service);
        assert!(matches!(result, Err(PoolError::InvalidConfiguration { .. })));
    }

    #[tokio::test]
    async fn test_single_instance_is_reused() {
        let (pool, service) = pool(1);

        let first = pool.acquire().await.unwrap();
        let serial = first.serial;
        assert_eq!(first.unique_name(), "openai0");
        first.release();

        let second = pool.acquire().await.unwrap();
        assert_eq!(second.serial, serial);
        assert_eq!(pool.constructed_count(), 1);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_instances_get_distinct_names() {
        let (pool, _) = pool(3);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();

        let mut names = vec![a.unique_name(), b.unique_name(), c.unique_name()];
        names.sort();
        assert_eq!(names, vec!["openai0", "openai1", "openai2"]);
        assert_eq!(c.service.as_deref(), Some("openai2"));
        assert_eq!(pool.active_count(), 3);
    }

    #[tokio::test]
    async fn test_timeout_reports_exhaustion() {
        let service: Arc<dyn ServiceRegistration<TestBuilder>> = Arc::new(RecordingService::default());
        let config = test_config("azure", 1).with_max_wait(Duration::from_millis(100));
        let pool = ResourcePool::new(config, service).unwrap();

        let held = pool.acquire().await.unwrap();
        let started = Instant::now();
        let result = pool.acquire().await;

        match result {
            Err(PoolError::PoolExhausted { unique_name, waited }) => {
                assert_eq!(unique_name, "azure");
                assert!(waited >= Duration::from_millis(100));
            }
            other => panic!("expected PoolExhausted, got {:?}", other),
        }
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(pool.get_metrics().exhausted_events, 1);

        // The late release only serves later callers.
        drop(held);
        let again = pool.acquire().await.unwrap();
        assert_eq!(again.unique_name(), "azure0");
    }

    #[tokio::test]
    async fn test_failed_construction_gives_slot_back() {
        let (pool, service) = pool(1);
        service.fail_next(true);

        let result = pool.acquire().await;
        assert!(matches!(result, Err(PoolError::Construction { .. })));
        assert_eq!(pool.get_metrics().construction_failures, 1);

        service.fail_next(false);
        let handle = pool.acquire().await.unwrap();
        assert_eq!(handle.unique_name(), "openai1");
        assert_eq!(pool.constructed_count(), 1);
    }

    #[tokio::test]
    async fn test_hooks_customize_construction() {
        let (pool, service) = pool(2);

        pool.register_for_pre_construction(|builder, config, options| {
            builder.plugins.push(format!("math@{}", config.unique_name));
            options.transport = Some("proxy".to_string());
        });
        pool.register_for_post_construction(|kernel, _| kernel.tags.push("ready".to_string()));

        let handle = pool.acquire().await.unwrap();
        assert_eq!(handle.plugins, vec!["math@openai0"]);
        assert_eq!(handle.transport.as_deref(), Some("proxy"));
        assert_eq!(handle.tags, vec!["ready"]);
        assert_eq!(service.calls(), 1);
        assert_eq!(pool.hook_count(), (1, 1));
    }

    #[tokio::test]
    async fn test_clearing_auto_register_skips_default_service() {
        let (pool, service) = pool(1);
        pool.register_for_pre_construction(|builder, _, options| {
            builder.service = Some("custom".to_string());
            options.auto_register_service = false;
        });

        let handle = pool.acquire().await.unwrap();
        assert_eq!(handle.service.as_deref(), Some("custom"));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_late_hooks_only_affect_new_resources() {
        let (pool, _) = pool(2);

        let first = pool.acquire().await.unwrap();
        pool.register_for_post_construction(|kernel, _| kernel.tags.push("late".to_string()));
        let second = pool.acquire().await.unwrap();

        assert!(first.tags.is_empty());
        assert_eq!(second.tags, vec!["late"]);
    }

    #[tokio::test]
    async fn test_scoped_hooks_match_advertised_scopes() {
        let service: Arc<dyn ServiceRegistration<TestBuilder>> = Arc::new(RecordingService::default());
        let config = test_config("mistral", 1).with_scopes(["math"]);
        let pool = ResourcePool::new(config, service).unwrap();

        pool.register_for_pre_construction_in_scope("math", |builder, _, _, scopes| {
            builder.plugins.push(format!("scoped:{}", scopes.join(",")));
        });
        pool.register_for_post_construction_in_scope("vision", |kernel, _, _| {
            kernel.tags.push("vision".to_string());
        });

        let handle = pool.acquire().await.unwrap();
        assert_eq!(handle.plugins, vec!["scoped:math"]);
        assert!(handle.tags.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_holders_never_exceed_instance_count() {
        let (pool, _) = pool(3);
        let pool = Arc::new(pool);
        let holders = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..24 {
            let pool = Arc::clone(&pool);
            let holders = Arc::clone(&holders);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let handle = pool.acquire().await.unwrap();
                let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                holders.fetch_sub(1, Ordering::SeqCst);
                drop(handle);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(pool.constructed_count() <= 3);
        assert_eq!(pool.available_count(), pool.constructed_count());
        assert_eq!(pool.get_metrics().total_acquired, 24);
    }
}
