//! Handle returned by a successful acquisition

use crate::config::{ProviderConfiguration, ServiceType};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) type ReturnFn<R> = Arc<dyn Fn(R, Arc<ProviderConfiguration>, Duration) + Send + Sync>;

/// A pooled resource that goes back to its pool when released or dropped
pub struct ResourceHandle<R: Send + 'static> {
    resource: Option<R>,
    configuration: Arc<ProviderConfiguration>,
    acquired_at: Instant,
    return_fn: ReturnFn<R>,
}

impl<R: Send + 'static> ResourceHandle<R> {
    pub(crate) fn new(
        resource: R,
        configuration: Arc<ProviderConfiguration>,
        return_fn: ReturnFn<R>,
    ) -> Self {
        Self {
            resource: Some(resource),
            configuration,
            acquired_at: Instant::now(),
            return_fn,
        }
    }

    /// The wrapped resource
    pub fn resource(&self) -> &R {
        self.resource.as_ref().expect("resource already released")
    }

    pub fn resource_mut(&mut self) -> &mut R {
        self.resource.as_mut().expect("resource already released")
    }

    /// Per-instance configuration the resource was built with
    pub fn configuration(&self) -> &ProviderConfiguration {
        &self.configuration
    }

    /// Per-instance name, e.g. `openai0`
    pub fn unique_name(&self) -> &str {
        &self.configuration.unique_name
    }

    pub fn service_type(&self) -> ServiceType {
        self.configuration.service_type()
    }

    /// How long the handle has been held
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Return the resource to its pool now
    pub fn release(mut self) {
        self.return_to_pool();
    }

    fn return_to_pool(&mut self) {
        if let Some(resource) = self.resource.take() {
            (self.return_fn)(
                resource,
                Arc::clone(&self.configuration),
                self.acquired_at.elapsed(),
            );
        }
    }
}

impl<R: Send + 'static> Deref for ResourceHandle<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        self.resource()
    }
}

impl<R: Send + 'static> DerefMut for ResourceHandle<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource_mut()
    }
}

impl<R: Send + 'static> Drop for ResourceHandle<R> {
    fn drop(&mut self) {
        self.return_to_pool();
    }
}

impl<R: Send + 'static> std::fmt::Debug for ResourceHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("unique_name", &self.configuration.unique_name)
            .field("service_type", &self.configuration.service_type())
            .field("held_for", &self.acquired_at.elapsed())
            .finish()
    }
}
