// Acquire/release overhead through the pool manager with a no-op client.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use esox_servicepool::{
    BoxError, OpenAISettings, PoolManager, PoolRegistry, ProviderConfiguration, ResourceBuilder,
    ServiceType,
};

#[derive(Default)]
struct NoOpBuilder;

impl ResourceBuilder for NoOpBuilder {
    type Resource = u64;
    type Transport = ();

    fn build(self) -> u64 {
        0
    }
}

fn manager(instance_count: usize, providers: usize) -> Arc<PoolManager<NoOpBuilder>> {
    let registry = PoolRegistry::<NoOpBuilder>::new();
    registry.register_provider(
        ServiceType::OpenAI,
        |_: &mut NoOpBuilder, _: &ProviderConfiguration, _: Option<()>| -> Result<(), BoxError> {
            Ok(())
        },
    );

    let configurations = (0..providers)
        .map(|i| {
            ProviderConfiguration::new(
                format!("bench{i}"),
                OpenAISettings {
                    api_key: "sk-bench".to_string(),
                    model_id: "gpt-4o-mini".to_string(),
                    org_id: None,
                    service_id: None,
                },
            )
            .with_instance_count(instance_count)
            .with_scopes(["bench"])
        })
        .collect();

    Arc::new(PoolManager::with_configurations(Arc::new(registry), configurations))
}

fn by_provider(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("failed to build runtime");
    let manager = manager(64, 1);

    // Warm up so the pool exists and holds one idle client.
    rt.block_on(async {
        drop(manager.acquire_by_provider(ServiceType::OpenAI).await.unwrap());
    });

    c.bench_function("acquire_by_provider", |b| {
        b.to_async(&rt).iter(|| {
            let manager = Arc::clone(&manager);
            async move {
                let handle = manager.acquire_by_provider(ServiceType::OpenAI).await.unwrap();
                black_box(*handle);
            }
        });
    });
}

fn by_scope_round_robin(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("failed to build runtime");
    let manager = manager(16, 4);

    c.bench_function("acquire_by_scope_4_providers", |b| {
        b.to_async(&rt).iter(|| {
            let manager = Arc::clone(&manager);
            async move {
                let handle = manager.acquire_by_scope("bench").await.unwrap();
                black_box(*handle);
            }
        });
    });
}

fn contended(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("failed to build runtime");

    // Eight tasks per iteration over two slots.
    let manager = manager(2, 1);

    c.bench_function("contended_acquire_release_2slots", |b| {
        b.to_async(&rt).iter(|| {
            let manager = Arc::clone(&manager);
            async move {
                let tasks: Vec<_> = (0..8)
                    .map(|_| {
                        let manager = Arc::clone(&manager);
                        tokio::spawn(async move {
                            let handle =
                                manager.acquire_by_provider(ServiceType::OpenAI).await.unwrap();
                            tokio::task::yield_now().await;
                            black_box(*handle);
                        })
                    })
                    .collect();
                for task in tasks {
                    task.await.unwrap();
                }
            }
        });
    });
}

criterion_group!(benches, by_provider, by_scope_round_robin, contended);
criterion_main!(benches);
