//! Configuration management for the analysis governor and its backend
//!
//! This module provides utilities for loading and validating configuration
//! from environment variables or in-memory values.

use std::env;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use once_cell::sync::Lazy;

use crate::error::{Result, AnalysisError};
use crate::resilience::CircuitBreakerConfig;
use crate::util::parse_duration;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value.trim().parse::<i64>()
            .map_err(|e| AnalysisError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a duration configuration value ("35s", "2000ms", "1m" or plain seconds)
    fn get_duration(&self, key: &str) -> Result<Duration> {
        let value = self.get_string(key)?;
        parse_duration(&value)
            .ok_or_else(|| AnalysisError::configuration(format!("Invalid duration for key {}: {}", key, value)))
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer configuration value with a default
    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    /// Get a duration configuration value with a default
    fn get_duration_or(&self, key: &str, default: Duration) -> Duration {
        self.get_duration(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "ANALYSIS", "GOVERNOR")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key)
            .map_err(|e| {
                match e {
                    env::VarError::NotPresent => {
                        AnalysisError::configuration(format!("Environment variable not set: {}", env_key))
                    }
                    env::VarError::NotUnicode(_) => {
                        AnalysisError::configuration(format!("Environment variable is not valid unicode: {}", env_key))
                    }
                }
            })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| AnalysisError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// A composite config provider that tries multiple providers in order
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    /// Create a new composite config provider
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Add a provider to the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }
}

impl Default for CompositeConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_string(key).ok())
            .ok_or_else(|| AnalysisError::configuration(format!("Configuration key not found in any provider: {}", key)))
    }
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> = Lazy::new(|| {
    Arc::new(EnvConfigProvider::new().with_prefix("INSPECTION"))
});

/// Trait for validated configuration sections
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Section name, used in log messages
    fn service_name(&self) -> &str;
}

/// Connection settings for the serverless analysis function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisServiceConfig {
    /// Base URL of the functions gateway, e.g. `https://<project>.supabase.co/functions/v1`
    pub functions_url: String,

    /// Anonymous or service key sent as bearer token and `apikey` header
    pub api_key: String,

    /// Name of the analysis function
    pub function_name: String,

    /// HTTP-level timeout in seconds; the governor enforces its own tighter deadline
    pub http_timeout_seconds: u64,
}

impl Default for AnalysisServiceConfig {
    fn default() -> Self {
        Self {
            functions_url: String::new(),
            api_key: String::new(),
            function_name: "analyze-media".to_string(),
            http_timeout_seconds: 40,
        }
    }
}

impl AnalysisServiceConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            functions_url: provider.get_string("analysis_functions_url")?,
            api_key: provider.get_string("analysis_api_key")?,
            function_name: provider.get_string_or("analysis_function_name", &defaults.function_name),
            http_timeout_seconds: provider
                .get_int_or("analysis_http_timeout_seconds", defaults.http_timeout_seconds as i64)
                .max(1) as u64,
        };

        config.validate()?;
        Ok(config)
    }

    /// Full URL of the analysis function
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.functions_url.trim_end_matches('/'),
            self.function_name.trim_start_matches('/')
        )
    }
}

impl ServiceConfig for AnalysisServiceConfig {
    fn validate(&self) -> Result<()> {
        if self.functions_url.is_empty() {
            return Err(AnalysisError::configuration("Analysis functions URL is required"));
        }

        if url::Url::parse(&self.functions_url).is_err() {
            return Err(AnalysisError::configuration(format!(
                "Analysis functions URL is not a valid URL: {}",
                self.functions_url
            )));
        }

        if self.api_key.is_empty() {
            return Err(AnalysisError::configuration("Analysis API key is required"));
        }

        if self.function_name.is_empty() {
            return Err(AnalysisError::configuration("Analysis function name is required"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "analysis_function"
    }
}

/// Admission and deadline settings for the request governor
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Maximum number of distinct keys in flight
    pub max_concurrent: usize,

    /// Deadline raced against every remote call
    pub request_timeout: Duration,

    /// Period of the stuck-request watchdog
    pub watchdog_interval: Duration,

    /// Extra age beyond `request_timeout` before the watchdog evicts a request
    pub watchdog_grace: Duration,

    /// Circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            request_timeout: Duration::from_secs(35),
            watchdog_interval: Duration::from_secs(15),
            watchdog_grace: Duration::from_secs(5),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl GovernorConfig {
    /// Load configuration from a config provider, falling back to defaults per key
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_concurrent: provider.get_int_or("governor_max_concurrent", defaults.max_concurrent as i64).max(0) as usize,
            request_timeout: provider.get_duration_or("governor_request_timeout", defaults.request_timeout),
            watchdog_interval: provider.get_duration_or("governor_watchdog_interval", defaults.watchdog_interval),
            watchdog_grace: provider.get_duration_or("governor_watchdog_grace", defaults.watchdog_grace),
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: provider
                    .get_int_or("circuit_failure_threshold", defaults.circuit_breaker.failure_threshold as i64)
                    .max(0) as u32,
                cooldown: provider.get_duration_or("circuit_cooldown", defaults.circuit_breaker.cooldown),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Age after which the watchdog treats a request as stuck
    pub fn stuck_after(&self) -> Duration {
        self.request_timeout + self.watchdog_grace
    }
}

impl ServiceConfig for GovernorConfig {
    fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(AnalysisError::configuration("Governor needs at least one concurrency slot"));
        }

        if self.request_timeout.is_zero() {
            return Err(AnalysisError::configuration("Request timeout must be greater than zero"));
        }

        if self.watchdog_interval.is_zero() {
            return Err(AnalysisError::configuration("Watchdog interval must be greater than zero"));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(AnalysisError::configuration("Circuit breaker threshold must be at least 1"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "governor"
    }
}

/// Settings for sequential batches
#[derive(Debug, Clone)]
pub struct SequentialConfig {
    /// Pause between two consecutive items of a batch
    pub inter_item_delay: Duration,
}

impl Default for SequentialConfig {
    fn default() -> Self {
        Self {
            inter_item_delay: Duration::from_millis(2000),
        }
    }
}

impl SequentialConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Self {
        Self {
            inter_item_delay: provider.get_duration_or("sequential_inter_item_delay", Self::default().inter_item_delay),
        }
    }
}

/// Settings for the auto-save debouncer
#[derive(Debug, Clone)]
pub struct AutoSaveConfig {
    /// Quiet period after the last change before a save is issued
    pub debounce: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
        }
    }
}

impl AutoSaveConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Self {
        Self {
            debounce: provider.get_duration_or("autosave_debounce", Self::default().debounce),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_provider_key_format() {
        let provider = EnvConfigProvider::new()
            .with_prefix("INSPECTION")
            .with_namespace("TEST");

        assert_eq!(provider.format_key("analysis_api_key"), "INSPECTION_TEST_ANALYSIS_API_KEY");
        assert_eq!(provider.format_key("functions-url"), "INSPECTION_TEST_FUNCTIONS_URL");
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = AnalysisServiceConfig {
            functions_url: "https://demo.supabase.co/functions/v1/".to_string(),
            api_key: "anon".to_string(),
            ..AnalysisServiceConfig::default()
        };

        assert_eq!(config.endpoint(), "https://demo.supabase.co/functions/v1/analyze-media");
    }
}
