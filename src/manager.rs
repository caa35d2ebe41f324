//! Routing of acquisitions to per-configuration pools

use crate::builder::ResourceBuilder;
use crate::config::{ProviderConfiguration, ServiceType};
use crate::errors::{PoolError, PoolResult};
use crate::handle::ResourceHandle;
use crate::hooks::{
    BuildOptions, PostConstructionHook, PreConstructionHook, ScopedPostConstructionHook,
    ScopedPreConstructionHook,
};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::PoolMetrics;
use crate::pool::ResourcePool;
use crate::registry::PoolRegistry;
use crate::section::ConfigSection;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
#[cfg(feature = "metrics")]
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Entry point for acquiring pooled resources.
///
/// Holds one [`ResourcePool`] per provider configuration, created the first
/// time that configuration is used. Resources are requested either by
/// provider type (first matching configuration) or by scope (round-robin
/// over the configurations advertising it).
pub struct PoolManager<B: ResourceBuilder> {
    registry: Arc<PoolRegistry<B>>,
    sections: Vec<ConfigSection>,
    configurations: OnceLock<PoolResult<Arc<[ProviderConfiguration]>>>,
    pools: DashMap<String, Arc<ResourcePool<B>>>,
    scope_cursors: DashMap<String, AtomicUsize>,
}

impl<B: ResourceBuilder> PoolManager<B> {
    /// Create a manager reading `sections` with the registry's readers.
    ///
    /// Sections are read once, on first use.
    pub fn new(registry: Arc<PoolRegistry<B>>, sections: Vec<ConfigSection>) -> Self {
        Self {
            registry,
            sections,
            configurations: OnceLock::new(),
            pools: DashMap::new(),
            scope_cursors: DashMap::new(),
        }
    }

    /// Create a manager over already typed configurations
    pub fn with_configurations(
        registry: Arc<PoolRegistry<B>>,
        configurations: Vec<ProviderConfiguration>,
    ) -> Self {
        let checked = check_configurations(configurations);
        Self {
            registry,
            sections: Vec::new(),
            configurations: OnceLock::from(checked),
            pools: DashMap::new(),
            scope_cursors: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &PoolRegistry<B> {
        &self.registry
    }

    /// All provider configurations, in configuration order
    pub fn configurations(&self) -> PoolResult<&[ProviderConfiguration]> {
        match self
            .configurations
            .get_or_init(|| self.load_configurations())
        {
            Ok(configurations) => Ok(&**configurations),
            Err(e) => Err(e.clone()),
        }
    }

    fn load_configurations(&self) -> PoolResult<Arc<[ProviderConfiguration]>> {
        let mut configurations = Vec::with_capacity(self.sections.len());

        for section in &self.sections {
            let service_type = match section.service_type() {
                Ok(service_type) => service_type,
                Err(e) => {
                    warn!(section = section.name(), error = %e, "skipping configuration section");
                    continue;
                }
            };

            let reader = self.registry.get_config_reader(service_type)?;
            match reader(section) {
                Ok(config) => configurations.push(config),
                Err(e) => {
                    warn!(
                        section = section.name(),
                        %service_type,
                        error = %e,
                        "failed to read configuration section"
                    );
                }
            }
        }

        let checked = check_configurations(configurations)?;
        info!(count = checked.len(), "provider configurations loaded");
        Ok(checked)
    }

    /// Fetch the pool of `config`, creating it on first use.
    ///
    /// The factory runs under the map's shard lock for that name, so it must not
    /// call back into this manager.
    fn pool_for(&self, config: &ProviderConfiguration) -> PoolResult<Arc<ResourcePool<B>>> {
        if let Some(pool) = self.pools.get(&config.unique_name) {
            return Ok(Arc::clone(pool.value()));
        }

        match self.pools.entry(config.unique_name.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let pool = Arc::new(self.registry.create_pool(config.clone())?);
                info!(
                    pool = %config.unique_name,
                    service_type = %config.service_type(),
                    instance_count = config.instance_count,
                    "pool created"
                );
                Ok(Arc::clone(entry.insert(pool).value()))
            }
        }
    }

    /// Fetch the pool of the configuration named `unique_name`, creating it on
    /// first use. `None` if no configuration has that name.
    pub fn pool(&self, unique_name: &str) -> PoolResult<Option<Arc<ResourcePool<B>>>> {
        let configurations = self.configurations()?;
        configurations
            .iter()
            .find(|c| c.unique_name == unique_name)
            .map(|c| self.pool_for(c))
            .transpose()
    }

    /// Number of pools created so far
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Acquire a resource from the first configuration of `service_type`
    pub async fn acquire_by_provider(
        &self,
        service_type: ServiceType,
    ) -> PoolResult<ResourceHandle<B::Resource>> {
        let config = self
            .configurations()?
            .iter()
            .find(|c| c.service_type() == service_type)
            .ok_or(PoolError::ConfigurationNotFound(service_type))?;

        let pool = self.pool_for(config)?;
        pool.acquire().await
    }

    /// Acquire a resource from the configurations advertising `scope`, rotating
    /// through them on every call.
    pub async fn acquire_by_scope(&self, scope: &str) -> PoolResult<ResourceHandle<B::Resource>> {
        let candidates: Vec<&ProviderConfiguration> = self
            .configurations()?
            .iter()
            .filter(|c| c.has_scope(scope))
            .collect();

        if candidates.is_empty() {
            return Err(PoolError::ScopeNotFound(scope.to_string()));
        }

        let index = self.next_in_rotation(scope) % candidates.len();
        let config = candidates[index];
        debug!(%scope, pool = %config.unique_name, index, "scope routed");

        let pool = self.pool_for(config)?;
        pool.acquire().await
    }

    fn next_in_rotation(&self, scope: &str) -> usize {
        if let Some(cursor) = self.scope_cursors.get(scope) {
            return cursor.fetch_add(1, Ordering::Relaxed);
        }
        self.scope_cursors
            .entry(scope.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed)
    }

    /// Pools of every configuration matching `filter`, created if needed
    fn pools_matching<P>(&self, filter: P) -> PoolResult<Vec<Arc<ResourcePool<B>>>>
    where
        P: Fn(&ProviderConfiguration) -> bool,
    {
        self.configurations()?
            .iter()
            .filter(|c| filter(*c))
            .map(|c| self.pool_for(c))
            .collect()
    }

    /// Register a pre-construction hook on every configuration of `service_type`.
    ///
    /// Returns the number of pools the hook was attached to.
    pub fn register_for_pre_construction<F>(&self, service_type: ServiceType, hook: F) -> PoolResult<usize>
    where
        F: Fn(&mut B, &ProviderConfiguration, &mut BuildOptions<B::Transport>) + Send + Sync + 'static,
    {
        let hook: PreConstructionHook<B> = Arc::new(hook);
        let pools = self.pools_matching(|c| c.service_type() == service_type)?;
        for pool in &pools {
            pool.add_pre_hook(Arc::clone(&hook));
        }
        Ok(pools.len())
    }

    /// Register a pre-construction hook on every configuration advertising `scope`
    pub fn register_for_pre_construction_in_scope<F>(&self, scope: &str, hook: F) -> PoolResult<usize>
    where
        F: Fn(&mut B, &ProviderConfiguration, &mut BuildOptions<B::Transport>, &[String])
            + Send
            + Sync
            + 'static,
    {
        let hook: ScopedPreConstructionHook<B> = Arc::new(hook);
        let pools = self.pools_matching(|c| c.has_scope(scope))?;
        for pool in &pools {
            pool.add_scoped_pre_hook(scope.to_string(), Arc::clone(&hook));
        }
        Ok(pools.len())
    }

    /// Register a post-construction hook on every configuration of `service_type`
    pub fn register_for_post_construction<F>(&self, service_type: ServiceType, hook: F) -> PoolResult<usize>
    where
        F: Fn(&mut B::Resource, &ProviderConfiguration) + Send + Sync + 'static,
    {
        let hook: PostConstructionHook<B::Resource> = Arc::new(hook);
        let pools = self.pools_matching(|c| c.service_type() == service_type)?;
        for pool in &pools {
            pool.add_post_hook(Arc::clone(&hook));
        }
        Ok(pools.len())
    }

    /// Register a post-construction hook on every configuration advertising `scope`
    pub fn register_for_post_construction_in_scope<F>(&self, scope: &str, hook: F) -> PoolResult<usize>
    where
        F: Fn(&mut B::Resource, &ProviderConfiguration, &[String]) + Send + Sync + 'static,
    {
        let hook: ScopedPostConstructionHook<B::Resource> = Arc::new(hook);
        let pools = self.pools_matching(|c| c.has_scope(scope))?;
        for pool in &pools {
            pool.add_scoped_post_hook(scope.to_string(), Arc::clone(&hook));
        }
        Ok(pools.len())
    }

    /// Metrics of every created pool, in configuration order
    pub fn metrics(&self) -> Vec<(String, PoolMetrics)> {
        let Ok(configurations) = self.configurations() else {
            return Vec::new();
        };

        configurations
            .iter()
            .filter_map(|c| {
                self.pools
                    .get(&c.unique_name)
                    .map(|pool| (c.unique_name.clone(), pool.get_metrics()))
            })
            .collect()
    }

    /// Export the metrics of every created pool in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        MetricsExporter::export_prometheus(&self.metrics(), tags)
    }
}

impl<B: ResourceBuilder> std::fmt::Debug for PoolManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("sections", &self.sections.len())
            .field("pools", &self.pools.len())
            .finish()
    }
}

fn check_configurations(
    configurations: Vec<ProviderConfiguration>,
) -> PoolResult<Arc<[ProviderConfiguration]>> {
    if configurations.is_empty() {
        return Err(PoolError::NoConfigurations);
    }

    {
        let mut seen = HashSet::new();
        for config in &configurations {
            config.validate()?;
            if !seen.insert(config.unique_name.as_str()) {
                return Err(PoolError::DuplicateUniqueName(config.unique_name.clone()));
            }
        }
    }

    Ok(configurations.into())
}
