//! Pre- and post-construction hooks

use crate::builder::ResourceBuilder;
use crate::config::ProviderConfiguration;
use parking_lot::RwLock;
use std::sync::Arc;

/// Options threaded through the pre-construction hooks of one construction.
///
/// Every hook sees the writes of the hooks registered before it.
#[derive(Debug, Clone)]
pub struct BuildOptions<T> {
    /// Transport handed to the provider's default service instead of its own
    pub transport: Option<T>,

    /// Whether the provider's default service is registered after the hooks ran.
    /// A hook that wires up the service itself clears this. Only the value left
    /// by the last hook counts, so a later hook may set it again.
    pub auto_register_service: bool,
}

impl<T> Default for BuildOptions<T> {
    fn default() -> Self {
        Self {
            transport: None,
            auto_register_service: true,
        }
    }
}

/// Transport type of a builder, shortened for the hook signatures.
pub type TransportOf<B> = <B as ResourceBuilder>::Transport;

pub type PreConstructionHook<B> =
    Arc<dyn Fn(&mut B, &ProviderConfiguration, &mut BuildOptions<TransportOf<B>>) + Send + Sync>;

pub type ScopedPreConstructionHook<B> = Arc<
    dyn Fn(&mut B, &ProviderConfiguration, &mut BuildOptions<TransportOf<B>>, &[String])
        + Send
        + Sync,
>;

pub type PostConstructionHook<R> = Arc<dyn Fn(&mut R, &ProviderConfiguration) + Send + Sync>;

pub type ScopedPostConstructionHook<R> =
    Arc<dyn Fn(&mut R, &ProviderConfiguration, &[String]) + Send + Sync>;

/// Append-only hook lists of one pool.
///
/// Running a chain works on a snapshot, so a hook registered while a
/// construction is in flight may or may not take part in it.
pub(crate) struct HookChain<B: ResourceBuilder> {
    pre: RwLock<Vec<PreConstructionHook<B>>>,
    scoped_pre: RwLock<Vec<(String, ScopedPreConstructionHook<B>)>>,
    post: RwLock<Vec<PostConstructionHook<B::Resource>>>,
    scoped_post: RwLock<Vec<(String, ScopedPostConstructionHook<B::Resource>)>>,
}

impl<B: ResourceBuilder> HookChain<B> {
    pub fn new() -> Self {
        Self {
            pre: RwLock::new(Vec::new()),
            scoped_pre: RwLock::new(Vec::new()),
            post: RwLock::new(Vec::new()),
            scoped_post: RwLock::new(Vec::new()),
        }
    }

    pub fn push_pre(&self, hook: PreConstructionHook<B>) {
        self.pre.write().push(hook);
    }

    pub fn push_scoped_pre(&self, scope: String, hook: ScopedPreConstructionHook<B>) {
        self.scoped_pre.write().push((scope, hook));
    }

    pub fn push_post(&self, hook: PostConstructionHook<B::Resource>) {
        self.post.write().push(hook);
    }

    pub fn push_scoped_post(&self, scope: String, hook: ScopedPostConstructionHook<B::Resource>) {
        self.scoped_post.write().push((scope, hook));
    }

    /// Run unscoped then scoped pre-construction hooks, in registration order.
    pub fn run_pre(
        &self,
        builder: &mut B,
        config: &ProviderConfiguration,
        options: &mut BuildOptions<B::Transport>,
    ) {
        let hooks = self.pre.read().clone();
        for hook in &hooks {
            hook(builder, config, options);
        }

        let scoped = self.scoped_pre.read().clone();
        for (scope, hook) in &scoped {
            if config.has_scope(scope) {
                hook(builder, config, options, &config.scopes);
            }
        }
    }

    /// Run unscoped then scoped post-construction hooks, in registration order.
    pub fn run_post(&self, resource: &mut B::Resource, config: &ProviderConfiguration) {
        let hooks = self.post.read().clone();
        for hook in &hooks {
            hook(resource, config);
        }

        let scoped = self.scoped_post.read().clone();
        for (scope, hook) in &scoped {
            if config.has_scope(scope) {
                hook(resource, config, &config.scopes);
            }
        }
    }

    /// Number of registered (pre, post) hooks, scoped ones included
    pub fn len(&self) -> (usize, usize) {
        (
            self.pre.read().len() + self.scoped_pre.read().len(),
            self.post.read().len() + self.scoped_post.read().len(),
        )
    }
}

impl<B: ResourceBuilder> Default for HookChain<B> {
    fn default() -> Self {
        Self::new()
    }
}
