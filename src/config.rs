use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::logic::notify::{
    NotificationDurations, DEFAULT_ERROR_MS, DEFAULT_SUCCESS_MS, DEFAULT_WARNING_MS,
};
use crate::logic::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub retry: RetryConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Root of the Flora IM REST namespace, e.g. `https://shop.example/wp-json/flora-im/v1`
    pub base_url: String,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub success_ms: u64,
    pub warning_ms: u64,
    pub error_ms: u64,
}

/// Consumer key/secret pair sent with every backend request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            retry: RetryConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/wp-json/flora-im/v1".to_string(),
            consumer_key: None,
            consumer_secret: None,
            timeout_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay_ms,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            success_ms: DEFAULT_SUCCESS_MS,
            warning_ms: DEFAULT_WARNING_MS,
            error_ms: DEFAULT_ERROR_MS,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional `config` file and
    /// `FLORA_*` environment variables (nested keys use `__`, e.g.
    /// `FLORA_REMOTE__CONSUMER_KEY`)
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        config = config.add_source(
            config::Environment::with_prefix("FLORA")
                .separator("__")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Credentials are never compiled in; both halves must be configured
    pub fn credentials(&self) -> anyhow::Result<Credentials> {
        let key = self
            .remote
            .consumer_key
            .as_deref()
            .filter(|k| !k.trim().is_empty());
        let secret = self
            .remote
            .consumer_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty());

        match (key, secret) {
            (Some(key), Some(secret)) => Ok(Credentials {
                consumer_key: key.to_string(),
                consumer_secret: secret.to_string(),
            }),
            _ => anyhow::bail!(
                "Flora credentials missing: set FLORA_REMOTE__CONSUMER_KEY and FLORA_REMOTE__CONSUMER_SECRET"
            ),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay_ms: self.retry.base_delay_ms,
        }
    }

    pub fn notification_durations(&self) -> NotificationDurations {
        NotificationDurations::from_millis(
            self.notifications.success_ms,
            self.notifications.warning_ms,
            self.notifications.error_ms,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }
}
