//! Outbound account credentials
//!
//! A [`Credential`] is the OAuth 1.0a tuple carried by every inbound event.
//! Secrets live in [`SecretString`] so they are zeroed on drop and never
//! show up in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};

/// OAuth 1.0a user-context credentials for one outbound account
pub struct Credential {
    consumer_key: String,
    consumer_secret: SecretString,
    access_token: String,
    access_secret: SecretString,
}

impl Credential {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: SecretString::from(consumer_secret.into()),
            access_token: access_token.into(),
            access_secret: SecretString::from(access_secret.into()),
        }
    }

    /// Key used to partition rate-limit state.
    ///
    /// Only the consumer key is used, so two accounts that share an app-level
    /// consumer key share one rate-limit bucket.
    pub fn partition_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(crate) fn consumer_secret(&self) -> &str {
        self.consumer_secret.expose_secret()
    }

    pub(crate) fn access_secret(&self) -> &str {
        self.access_secret.expose_secret()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &self.access_token)
            .field("access_secret", &"[REDACTED]")
            .finish()
    }
}
