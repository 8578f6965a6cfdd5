//! Error types for Tweetbridge

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Event decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Rate limit header error: {0}")]
    RateLimitParse(#[from] RateLimitParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::Config(_) => 2,
            BridgeError::Platform(_)
            | BridgeError::Decode(_)
            | BridgeError::RateLimitParse(_)
            | BridgeError::Io(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A payload from the transport could not be turned into an event
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed event JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),
}

/// Rate-limit headers on a post response were present but unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitParseError {
    #[error("header {header} is not an integer: {value:?}")]
    NotAnInteger { header: &'static str, value: String },

    #[error("header {header} is missing while the daily quota is exhausted")]
    Missing { header: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        let error = BridgeError::Config(ConfigError::MissingField("mqtt.topic".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_io_error() {
        let error: BridgeError = std::io::Error::new(std::io::ErrorKind::Other, "signal handler").into();
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_platform_errors() {
        let upload = BridgeError::Platform(PlatformError::Upload("500".to_string()));
        let transport = BridgeError::Platform(PlatformError::Transport("refused".to_string()));
        let timeout = BridgeError::Platform(PlatformError::Timeout("30s".to_string()));
        assert_eq!(upload.exit_code(), 1);
        assert_eq!(transport.exit_code(), 1);
        assert_eq!(timeout.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting_platform() {
        let error: BridgeError = PlatformError::Transport("connection refused".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Platform error: Transport error: connection refused"
        );
    }

    #[test]
    fn test_error_message_formatting_config() {
        let error: BridgeError = ConfigError::InvalidValue {
            field: "mqtt.broker".to_string(),
            reason: "port is not a number".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid value for mqtt.broker: port is not a number"
        );
    }

    #[test]
    fn test_rate_limit_parse_error_formatting() {
        let error = RateLimitParseError::NotAnInteger {
            header: "x-app-limit-24hour-remaining",
            value: "lots".to_string(),
        };
        let message = BridgeError::from(error).to_string();
        assert!(message.starts_with("Rate limit header error:"));
        assert!(message.contains("x-app-limit-24hour-remaining"));
        assert!(message.contains("\"lots\""));
    }

    #[test]
    fn test_decode_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: BridgeError = DecodeError::from(json_error).into();

        match error {
            BridgeError::Decode(DecodeError::Json(_)) => {}
            other => panic!("Expected BridgeError::Decode, got {:?}", other),
        }
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Upload("media endpoint unreachable".to_string());
        let cloned = original.clone();

        assert_eq!(original.to_string(), cloned.to_string());
    }
}
