//! Shared fixtures for unit tests

use crate::builder::{ResourceBuilder, ServiceRegistration};
use crate::config::{OpenAISettings, ProviderConfiguration};
use crate::errors::BoxError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static NEXT_SERIAL: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Default)]
pub struct TestBuilder {
    pub plugins: Vec<String>,
    pub service: Option<String>,
    pub transport: Option<String>,
}

#[derive(Debug)]
pub struct TestKernel {
    pub serial: usize,
    pub plugins: Vec<String>,
    pub service: Option<String>,
    pub transport: Option<String>,
    pub tags: Vec<String>,
}

impl ResourceBuilder for TestBuilder {
    type Resource = TestKernel;
    type Transport = String;

    fn build(self) -> TestKernel {
        TestKernel {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::SeqCst),
            plugins: self.plugins,
            service: self.service,
            transport: self.transport,
            tags: Vec::new(),
        }
    }
}

/// Default service that records the instance name and transport it was given
#[derive(Default)]
pub struct RecordingService {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingService {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ServiceRegistration<TestBuilder> for RecordingService {
    async fn register_service(
        &self,
        builder: &mut TestBuilder,
        config: &ProviderConfiguration,
        transport: Option<String>,
    ) -> Result<(), BoxError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("service endpoint unreachable".into());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        builder.service = Some(config.unique_name.clone());
        if transport.is_some() {
            builder.transport = transport;
        }
        Ok(())
    }
}

pub fn test_config(name: &str, instance_count: usize) -> ProviderConfiguration {
    ProviderConfiguration::new(
        name,
        OpenAISettings {
            api_key: "sk-test".to_string(),
            model_id: "gpt-4o".to_string(),
            org_id: None,
            service_id: None,
        },
    )
    .with_instance_count(instance_count)
}
