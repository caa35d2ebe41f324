//! # EsoxSolutions.ServicePool
//!
//! Bounded pools of expensive AI service clients ("resources"), built lazily
//! per provider configuration and routed by provider type or by scope.
//!
//! ## Features
//!
//! - One pool per provider configuration, created on first use
//! - Concurrency limited per provider by its instance count
//! - Resources constructed on demand and reused, returned via RAII (Drop trait)
//! - Acquisition timeout reported as backpressure (`PoolExhausted`)
//! - Round-robin selection across the configurations sharing a scope
//! - Pre- and post-construction hooks, globally or per scope
//! - Provider plugins registered through a factory/reader registry
//! - Metrics and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_servicepool::{
//!     BoxError, ConfigSection, PoolManager, PoolRegistry, ProviderConfiguration,
//!     ResourceBuilder, ServiceType,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct ClientBuilder {
//!     model: Option<String>,
//! }
//!
//! struct Client {
//!     model: Option<String>,
//! }
//!
//! impl ResourceBuilder for ClientBuilder {
//!     type Resource = Client;
//!     type Transport = ();
//!
//!     fn build(self) -> Client {
//!         Client { model: self.model }
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = PoolRegistry::<ClientBuilder>::new();
//! registry.register_provider(
//!     ServiceType::OpenAI,
//!     |builder: &mut ClientBuilder, config: &ProviderConfiguration, _: Option<()>| -> Result<(), BoxError> {
//!         builder.model = Some(config.unique_name.clone());
//!         Ok(())
//!     },
//! );
//!
//! let sections = ConfigSection::list_from_json(r#"[
//!     { "UniqueName": "openai", "ServiceType": "OpenAI", "InstanceCount": 2,
//!       "Scopes": ["math"], "ApiKey": "sk-test", "ModelId": "gpt-4o" }
//! ]"#).unwrap();
//!
//! let manager = PoolManager::new(Arc::new(registry), sections);
//! {
//!     let client = manager.acquire_by_scope("math").await.unwrap();
//!     assert_eq!(client.model.as_deref(), Some("openai0"));
//!     // Client automatically returned when `client` goes out of scope
//! }
//! # });
//! ```

mod builder;
mod config;
mod errors;
mod handle;
mod hooks;
mod manager;
mod metrics;
mod pool;
mod registry;
mod section;

#[cfg(test)]
mod testing;

pub use builder::{ResourceBuilder, ServiceRegistration};
pub use config::{
    AzureOpenAISettings, DEFAULT_MAX_WAIT, GoogleSettings, HuggingFaceSettings, MistralAISettings,
    OpenAISettings, OtherAISettings, ProviderConfiguration, ProviderSettings, ServiceType,
};
pub use errors::{BoxError, PoolError, PoolResult};
pub use handle::ResourceHandle;
pub use hooks::{
    BuildOptions, PostConstructionHook, PreConstructionHook, ScopedPostConstructionHook,
    ScopedPreConstructionHook, TransportOf,
};
pub use manager::PoolManager;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::ResourcePool;
pub use registry::{ConfigReader, PoolFactory, PoolRegistry};
pub use section::{ConfigSection, SECTIONS_KEY};
