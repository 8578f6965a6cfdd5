//! Configuration management for Tweetbridge
//!
//! Settings come from an optional TOML file, then the environment variables
//! used by existing deployments (`MQTT_BROKER`, `MQTT_TOPIC`, ...) override
//! whatever the file set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub twitter: TwitterConfig,
    pub relay: RelayConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker address: `tcp://host:port`, `mqtt://host:port` or `host[:port]`
    pub broker: String,
    pub client_id: String,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: String::new(),
            client_id: "tweetbridge".to_string(),
            topic: String::new(),
            username: None,
            password: None,
            keep_alive_secs: 30,
        }
    }
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("broker", &self.broker)
            .field("client_id", &self.client_id)
            .field("topic", &self.topic)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("keep_alive_secs", &self.keep_alive_secs)
            .finish()
    }
}

impl MqttConfig {
    /// Split the broker address into host and port
    pub fn broker_address(&self) -> Result<(String, u16)> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "mqtt.broker".to_string(),
            reason: reason.to_string(),
        };

        let address = match self.broker.split_once("://") {
            Some(("tcp", rest)) | Some(("mqtt", rest)) => rest,
            Some((scheme, _)) => {
                return Err(invalid(&format!("unsupported scheme '{}'", scheme)).into())
            }
            None => self.broker.as_str(),
        };
        let address = address.trim_end_matches('/');

        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| invalid(&format!("port '{}' is not a number", port)))?;
                (host, port)
            }
            None => (address, DEFAULT_MQTT_PORT),
        };

        if host.is_empty() {
            return Err(invalid("host is empty").into());
        }

        Ok((host.to_string(), port))
    }

    /// Username and password to authenticate with, if a username is set
    pub fn credentials(&self) -> Option<(String, String)> {
        self.username
            .as_ref()
            .filter(|user| !user.is_empty())
            .map(|user| (user.clone(), self.password.clone().unwrap_or_default()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    /// Base URL of the v2 API (tweets endpoint)
    pub api_base: String,
    /// Base URL of the v1.1 media upload API
    pub upload_base: String,
    pub request_timeout_secs: u64,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com".to_string(),
            upload_base: "https://upload.twitter.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl TwitterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// What to do when an image fails to upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadFailurePolicy {
    /// Post anyway, without the failed image
    #[default]
    Degrade,
    /// Abandon the whole event
    FailClosed,
}

impl std::str::FromStr for UploadFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "degrade" => Ok(UploadFailurePolicy::Degrade),
            "fail-closed" | "fail_closed" => Ok(UploadFailurePolicy::FailClosed),
            _ => Err(format!(
                "Invalid upload failure policy: '{}'. Valid options: degrade, fail-closed",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub upload_failure_policy: UploadFailurePolicy,
    /// How often expired rate-limit entries are swept from the registry
    pub purge_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upload_failure_policy: UploadFailurePolicy::default(),
            purge_interval_secs: 300,
        }
    }
}

impl RelayConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides
    ///
    /// A missing config file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Override settings from the process environment
    ///
    /// Empty variables are ignored.
    pub fn apply_env_overrides(&mut self) {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|value| !value.is_empty())
        }

        if let Some(broker) = var("MQTT_BROKER") {
            self.mqtt.broker = broker;
        }
        if let Some(client_id) = var("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(topic) = var("MQTT_TOPIC") {
            self.mqtt.topic = topic;
        }
        if let Some(username) = var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(policy) = var("TWEETBRIDGE_UPLOAD_FAILURE_POLICY") {
            match policy.parse() {
                Ok(policy) => self.relay.upload_failure_policy = policy,
                Err(e) => tracing::warn!("Ignoring TWEETBRIDGE_UPLOAD_FAILURE_POLICY: {}", e),
            }
        }
    }

    /// Check that everything needed to run the relay is present
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.broker.is_empty() {
            return Err(ConfigError::MissingField("mqtt.broker".to_string()).into());
        }
        if self.mqtt.topic.is_empty() {
            return Err(ConfigError::MissingField("mqtt.topic".to_string()).into());
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::MissingField("mqtt.client_id".to_string()).into());
        }
        if self.twitter.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "twitter.request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        if self.relay.purge_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "relay.purge_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        self.mqtt.broker_address()?;
        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TWEETBRIDGE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("tweetbridge").join("config.toml"))
}
