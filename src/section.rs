//! Raw configuration sections and typed reading of provider configurations

use crate::config::{
    AzureOpenAISettings, DEFAULT_MAX_WAIT, GoogleSettings, HuggingFaceSettings, MistralAISettings,
    OpenAISettings, OtherAISettings, ProviderConfiguration, ProviderSettings, ServiceType,
};
use crate::errors::{PoolError, PoolResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Key of the section list when sections are wrapped in an object.
pub const SECTIONS_KEY: &str = "ServiceProviderConfigurations";

const UNNAMED: &str = "<unnamed>";

/// One raw provider section, as it came out of the configuration source.
///
/// # Examples
///
/// ```
/// use esox_servicepool::{ConfigSection, OpenAISettings, ServiceType};
///
/// let sections = ConfigSection::list_from_json(r#"{
///     "ServiceProviderConfigurations": [
///         { "UniqueName": "openai", "ServiceType": "OpenAI", "InstanceCount": 2,
///           "Scopes": ["math"], "ApiKey": "sk-test", "ModelId": "gpt-4o" }
///     ]
/// }"#).unwrap();
///
/// assert_eq!(sections[0].service_type().unwrap(), ServiceType::OpenAI);
/// let config = sections[0].read::<OpenAISettings>().unwrap();
/// assert_eq!(config.instance_count, 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSection {
    value: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SharedFields {
    unique_name: String,
    #[serde(default = "default_instance_count")]
    instance_count: usize,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    max_wait_for_kernel_in_seconds: Option<u64>,
    #[serde(default)]
    deployment_text_embedding: Option<String>,
}

fn default_instance_count() -> usize {
    1
}

impl ConfigSection {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Parse a list of sections from JSON.
    ///
    /// Accepts a bare array or an object holding the array under
    /// `ServiceProviderConfigurations`.
    pub fn list_from_json(json: &str) -> PoolResult<Vec<ConfigSection>> {
        let root: Value = serde_json::from_str(json)
            .map_err(|e| PoolError::invalid(SECTIONS_KEY, e.to_string()))?;

        let list = match root {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove(SECTIONS_KEY) {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(PoolError::invalid(SECTIONS_KEY, "expected an array"));
                }
                None => Vec::new(),
            },
            _ => {
                return Err(PoolError::invalid(
                    SECTIONS_KEY,
                    "expected an array or an object",
                ));
            }
        };

        Ok(list.into_iter().map(ConfigSection::new).collect())
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    /// The section's `UniqueName`, for diagnostics
    pub fn name(&self) -> &str {
        self.get("UniqueName")
            .and_then(Value::as_str)
            .unwrap_or(UNNAMED)
    }

    /// Resolve the section's `ServiceType` tag
    pub fn service_type(&self) -> PoolResult<ServiceType> {
        let tag = self
            .get("ServiceType")
            .and_then(Value::as_str)
            .ok_or_else(|| PoolError::invalid(self.name(), "missing ServiceType"))?;

        tag.parse()
            .map_err(|reason: String| PoolError::invalid(self.name(), reason))
    }

    /// Read the shared fields plus provider settings `S` into a configuration.
    pub fn read<S>(&self) -> PoolResult<ProviderConfiguration>
    where
        S: DeserializeOwned + Into<ProviderSettings>,
    {
        let shared = SharedFields::deserialize(&self.value)
            .map_err(|e| PoolError::invalid(self.name(), e.to_string()))?;
        let settings: ProviderSettings = S::deserialize(&self.value)
            .map_err(|e| PoolError::invalid(self.name(), e.to_string()))?
            .into();

        if let Some(tag) = self.get("ServiceType").and_then(Value::as_str)
            && tag != settings.service_type().as_str()
        {
            return Err(PoolError::invalid(
                self.name(),
                format!(
                    "ServiceType '{}' does not match {} settings",
                    tag,
                    settings.service_type()
                ),
            ));
        }

        let mut config = ProviderConfiguration::new(shared.unique_name, settings)
            .with_instance_count(shared.instance_count)
            .with_scopes(shared.scopes)
            .with_max_wait(
                shared
                    .max_wait_for_kernel_in_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_MAX_WAIT),
            );
        config.deployment_text_embedding = shared.deployment_text_embedding;

        config.validate()?;
        Ok(config)
    }
}

impl From<Value> for ConfigSection {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// The serde reader for a built-in provider type
pub(crate) fn default_reader(
    service_type: ServiceType,
) -> fn(&ConfigSection) -> PoolResult<ProviderConfiguration> {
    match service_type {
        ServiceType::AzureOpenAI => ConfigSection::read::<AzureOpenAISettings>,
        ServiceType::OpenAI => ConfigSection::read::<OpenAISettings>,
        ServiceType::MistralAI => ConfigSection::read::<MistralAISettings>,
        ServiceType::Google => ConfigSection::read::<GoogleSettings>,
        ServiceType::HuggingFace => ConfigSection::read::<HuggingFaceSettings>,
        ServiceType::OtherAI => ConfigSection::read::<OtherAISettings>,
    }
}
