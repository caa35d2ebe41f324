//! Provider configuration records

use crate::errors::{PoolError, PoolResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default acquisition timeout when a section does not set `MaxWaitForKernelInSeconds`.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

/// The kind of remote AI service a configuration points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    AzureOpenAI,
    OpenAI,
    MistralAI,
    Google,
    HuggingFace,
    OtherAI,
}

impl ServiceType {
    /// All built-in provider types, in declaration order.
    pub const ALL: [ServiceType; 6] = [
        ServiceType::AzureOpenAI,
        ServiceType::OpenAI,
        ServiceType::MistralAI,
        ServiceType::Google,
        ServiceType::HuggingFace,
        ServiceType::OtherAI,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::AzureOpenAI => "AzureOpenAI",
            ServiceType::OpenAI => "OpenAI",
            ServiceType::MistralAI => "MistralAI",
            ServiceType::Google => "Google",
            ServiceType::HuggingFace => "HuggingFace",
            ServiceType::OtherAI => "OtherAI",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unsupported service provider type '{}'", s))
    }
}

/// Azure OpenAI deployment settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AzureOpenAISettings {
    pub deployment_name: String,
    pub api_key: String,
    pub model_id: String,
    pub endpoint: String,
    pub service_id: String,
}

/// OpenAI settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OpenAISettings {
    pub api_key: String,
    pub model_id: String,
    pub org_id: Option<String>,
    pub service_id: Option<String>,
}

/// Mistral AI settings; `endpoint` falls back to the vendor default when absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MistralAISettings {
    pub model_id: String,
    pub endpoint: Option<String>,
    pub api_key: String,
    pub service_id: String,
}

/// Google AI settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GoogleSettings {
    pub model_id: String,
    pub api_key: String,
    pub api_version: String,
    pub service_id: String,
}

/// HuggingFace inference settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HuggingFaceSettings {
    pub model: String,
    pub api_key: String,
    pub endpoint: String,
    pub service_id: String,
}

/// Settings for any OpenAI-compatible endpoint not covered above
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OtherAISettings {
    pub model_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub service_id: String,
}

/// Provider-specific part of a configuration.
///
/// The variant is the single source of truth for the configuration's
/// [`ServiceType`]; the pool itself never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSettings {
    AzureOpenAI(AzureOpenAISettings),
    OpenAI(OpenAISettings),
    MistralAI(MistralAISettings),
    Google(GoogleSettings),
    HuggingFace(HuggingFaceSettings),
    OtherAI(OtherAISettings),
}

impl ProviderSettings {
    pub fn service_type(&self) -> ServiceType {
        match self {
            ProviderSettings::AzureOpenAI(_) => ServiceType::AzureOpenAI,
            ProviderSettings::OpenAI(_) => ServiceType::OpenAI,
            ProviderSettings::MistralAI(_) => ServiceType::MistralAI,
            ProviderSettings::Google(_) => ServiceType::Google,
            ProviderSettings::HuggingFace(_) => ServiceType::HuggingFace,
            ProviderSettings::OtherAI(_) => ServiceType::OtherAI,
        }
    }
}

macro_rules! settings_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ProviderSettings {
                fn from(settings: $ty) -> Self {
                    ProviderSettings::$variant(settings)
                }
            }
        )*
    };
}

settings_from! {
    AzureOpenAI => AzureOpenAISettings,
    OpenAI => OpenAISettings,
    MistralAI => MistralAISettings,
    Google => GoogleSettings,
    HuggingFace => HuggingFaceSettings,
    OtherAI => OtherAISettings,
}

/// Configuration for one pooled provider
///
/// # Examples
///
/// ```
/// use esox_servicepool::{OpenAISettings, ProviderConfiguration, ServiceType};
/// use std::time::Duration;
///
/// let config = ProviderConfiguration::new(
///     "openai",
///     OpenAISettings {
///         api_key: "sk-test".to_string(),
///         model_id: "gpt-4o".to_string(),
///         org_id: None,
///         service_id: None,
///     },
/// )
/// .with_instance_count(4)
/// .with_scopes(["math", "chat"])
/// .with_max_wait(Duration::from_secs(5));
///
/// assert_eq!(config.service_type(), ServiceType::OpenAI);
/// assert!(config.has_scope("math"));
/// assert_eq!(config.instance_count, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfiguration {
    /// Name of the configuration; unique within a manager
    pub unique_name: String,

    /// Maximum number of resources outstanding at the same time
    pub instance_count: usize,

    /// Scopes this configuration can be selected by, in declaration order
    pub scopes: Vec<String>,

    /// How long an acquisition waits for a free slot
    pub max_wait: Duration,

    /// Embedding deployment, for providers that use one
    pub deployment_text_embedding: Option<String>,

    /// Provider-specific settings
    pub settings: ProviderSettings,
}

impl ProviderConfiguration {
    /// Create a configuration with a single instance, no scopes and the default wait
    pub fn new(unique_name: impl Into<String>, settings: impl Into<ProviderSettings>) -> Self {
        Self {
            unique_name: unique_name.into(),
            instance_count: 1,
            scopes: Vec::new(),
            max_wait: DEFAULT_MAX_WAIT,
            deployment_text_embedding: None,
            settings: settings.into(),
        }
    }

    /// Set the number of concurrently outstanding resources
    pub fn with_instance_count(mut self, count: usize) -> Self {
        self.instance_count = count;
        self
    }

    /// Set the scopes; duplicates are dropped, first occurrence wins
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.clear();
        for scope in scopes {
            let scope = scope.into();
            if !self.scopes.contains(&scope) {
                self.scopes.push(scope);
            }
        }
        self
    }

    /// Set the acquisition timeout
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_deployment_text_embedding(mut self, deployment: impl Into<String>) -> Self {
        self.deployment_text_embedding = Some(deployment.into());
        self
    }

    pub fn service_type(&self) -> ServiceType {
        self.settings.service_type()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Copy of this configuration naming the `index`-th constructed resource.
    pub(crate) fn for_instance(&self, index: usize) -> Self {
        Self {
            unique_name: format!("{}{}", self.unique_name, index),
            ..self.clone()
        }
    }

    /// Check the invariants a pool relies on
    pub fn validate(&self) -> PoolResult<()> {
        if self.unique_name.trim().is_empty() {
            return Err(PoolError::invalid(
                self.service_type().as_str(),
                "UniqueName must not be empty",
            ));
        }
        if self.instance_count == 0 {
            return Err(PoolError::invalid(
                &self.unique_name,
                "InstanceCount must be at least 1",
            ));
        }
        Ok(())
    }
}
