//! The seam between the pool and provider-specific resource construction

use crate::config::ProviderConfiguration;
use crate::errors::BoxError;
use async_trait::async_trait;

/// A mutable builder that pre-construction hooks customize and that is
/// finally turned into a pooled resource.
///
/// A fresh builder is created with [`Default`] for every construction.
pub trait ResourceBuilder: Default + Send + 'static {
    /// The pooled resource, e.g. a client bound to one remote service
    type Resource: Send + Sync + 'static;

    /// Transport handle a hook may supply in place of the provider default
    type Transport: Clone + Send + Sync + 'static;

    /// Finalize the builder into a resource
    fn build(self) -> Self::Resource;
}

/// Registers the provider's default service on a builder.
///
/// Supplied by each provider plugin; the pool only decides whether to call it.
/// Plain closures implement this trait.
#[async_trait]
pub trait ServiceRegistration<B: ResourceBuilder>: Send + Sync {
    async fn register_service(
        &self,
        builder: &mut B,
        config: &ProviderConfiguration,
        transport: Option<B::Transport>,
    ) -> Result<(), BoxError>;
}

#[async_trait]
impl<B, F> ServiceRegistration<B> for F
where
    B: ResourceBuilder,
    F: Fn(&mut B, &ProviderConfiguration, Option<B::Transport>) -> Result<(), BoxError>
        + Send
        + Sync,
{
    async fn register_service(
        &self,
        builder: &mut B,
        config: &ProviderConfiguration,
        transport: Option<B::Transport>,
    ) -> Result<(), BoxError> {
        (self)(builder, config, transport)
    }
}
