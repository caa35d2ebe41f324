//! Pool factories and configuration readers per provider type

use crate::builder::{ResourceBuilder, ServiceRegistration};
use crate::config::{ProviderConfiguration, ServiceType};
use crate::errors::{PoolError, PoolResult};
use crate::pool::ResourcePool;
use crate::section::{ConfigSection, default_reader};

use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Builds the pool for one provider configuration
pub type PoolFactory<B> =
    Arc<dyn Fn(ProviderConfiguration) -> PoolResult<ResourcePool<B>> + Send + Sync>;

/// Turns a raw section into a typed provider configuration
pub type ConfigReader =
    Arc<dyn Fn(&ConfigSection) -> PoolResult<ProviderConfiguration> + Send + Sync>;

/// Registry of what each provider type needs to take part in pooling.
///
/// Populated at startup by provider plugins. Registering a type again
/// replaces the earlier entry.
pub struct PoolRegistry<B: ResourceBuilder> {
    factories: DashMap<ServiceType, PoolFactory<B>>,
    readers: DashMap<ServiceType, ConfigReader>,
}

impl<B: ResourceBuilder> PoolRegistry<B> {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
            readers: DashMap::new(),
        }
    }

    /// A registry with the serde readers of every built-in provider type
    pub fn with_default_readers() -> Self {
        let registry = Self::new();
        for service_type in ServiceType::ALL {
            registry.register_config_reader(service_type, default_reader(service_type));
        }
        registry
    }

    /// The factory is called while the manager holds a map lock for the pool
    /// being created; it must not call back into the manager.
    pub fn register_pool_factory<F>(&self, service_type: ServiceType, factory: F)
    where
        F: Fn(ProviderConfiguration) -> PoolResult<ResourcePool<B>> + Send + Sync + 'static,
    {
        info!(%service_type, "registering pool factory");
        self.factories.insert(service_type, Arc::new(factory));
    }

    pub fn register_config_reader<F>(&self, service_type: ServiceType, reader: F)
    where
        F: Fn(&ConfigSection) -> PoolResult<ProviderConfiguration> + Send + Sync + 'static,
    {
        info!(%service_type, "registering configuration reader");
        self.readers.insert(service_type, Arc::new(reader));
    }

    /// Wire a provider in one call: pools built around `service`, read with the
    /// built-in serde reader for `service_type`.
    pub fn register_provider<S>(&self, service_type: ServiceType, service: S)
    where
        S: ServiceRegistration<B> + 'static,
    {
        let service: Arc<dyn ServiceRegistration<B>> = Arc::new(service);
        self.register_pool_factory(service_type, move |config| {
            ResourcePool::new(config, Arc::clone(&service))
        });
        self.register_config_reader(service_type, default_reader(service_type));
    }

    pub fn get_pool_factory(&self, service_type: ServiceType) -> PoolResult<PoolFactory<B>> {
        self.factories
            .get(&service_type)
            .map(|f| Arc::clone(f.value()))
            .ok_or(PoolError::UnregisteredProvider(service_type))
    }

    pub fn get_config_reader(&self, service_type: ServiceType) -> PoolResult<ConfigReader> {
        self.readers
            .get(&service_type)
            .map(|r| Arc::clone(r.value()))
            .ok_or(PoolError::UnregisteredProvider(service_type))
    }

    /// Build the pool for `config` with the factory of its provider type
    pub fn create_pool(&self, config: ProviderConfiguration) -> PoolResult<ResourcePool<B>> {
        let factory = self.get_pool_factory(config.service_type())?;
        factory(config)
    }

    /// Read a section with the reader of the given provider type
    pub fn read_configuration(
        &self,
        service_type: ServiceType,
        section: &ConfigSection,
    ) -> PoolResult<ProviderConfiguration> {
        let reader = self.get_config_reader(service_type)?;
        reader(section)
    }
}

impl<B: ResourceBuilder> Default for PoolRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingService, TestBuilder, test_config};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unregistered_lookups_fail() {
        let registry = PoolRegistry::<TestBuilder>::new();

        assert!(matches!(
            registry.get_pool_factory(ServiceType::Google),
            Err(PoolError::UnregisteredProvider(ServiceType::Google))
        ));
        assert!(matches!(
            registry.get_config_reader(ServiceType::Google),
            Err(PoolError::UnregisteredProvider(ServiceType::Google))
        ));
    }

    #[test]
    fn test_register_provider_wires_factory_and_reader() {
        let registry = PoolRegistry::<TestBuilder>::new();
        registry.register_provider(ServiceType::OpenAI, RecordingService::default());

        let section = ConfigSection::new(json!({
            "UniqueName": "openai",
            "ServiceType": "OpenAI",
            "InstanceCount": 2,
            "ApiKey": "sk",
            "ModelId": "gpt-4o"
        }));
        let config = registry
            .read_configuration(ServiceType::OpenAI, &section)
            .unwrap();
        let pool = registry.create_pool(config).unwrap();

        assert_eq!(pool.unique_name(), "openai");
        assert_eq!(pool.configuration().instance_count, 2);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = PoolRegistry::<TestBuilder>::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        for counter in [Arc::clone(&first), Arc::clone(&second)] {
            registry.register_pool_factory(ServiceType::OpenAI, move |config| {
                counter.fetch_add(1, Ordering::SeqCst);
                ResourcePool::new(config, Arc::new(RecordingService::default()))
            });
        }

        registry.create_pool(test_config("openai", 1)).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_readers_cover_all_types() {
        let registry = PoolRegistry::<TestBuilder>::with_default_readers();
        for service_type in ServiceType::ALL {
            assert!(registry.get_config_reader(service_type).is_ok());
            assert!(registry.get_pool_factory(service_type).is_err());
        }
    }
}
