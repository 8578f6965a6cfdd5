//! Outbound platform abstraction
//!
//! The relay talks to the posting API through two narrow traits: one that
//! turns raw image bytes into a media reference, and one that sends a post.
//! [`twitter::TwitterClient`] implements both over HTTP; [`mock`] provides
//! recording doubles for tests.
//!
//! # Examples
//!
//! ```no_run
//! use libtweetbridge::config::TwitterConfig;
//! use libtweetbridge::credentials::Credential;
//! use libtweetbridge::platforms::{twitter::TwitterClient, MessagePoster};
//!
//! # async fn example() -> libtweetbridge::error::Result<()> {
//! let client = TwitterClient::new(&TwitterConfig::default())?;
//! let credential = Credential::new("key", "secret", "token", "token-secret");
//!
//! let response = client.post(&credential, "Hello from MQTT", &[]).await?;
//! println!("HTTP {}: {}", response.status, response.body);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::error::Result;
use crate::types::{MediaUpload, PostResponse};

pub mod mock;
pub mod twitter;

/// Uploads one image and returns the platform's media record
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload raw image bytes on behalf of `credential`
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Upload` when the request fails or the response
    /// carries no usable media reference.
    async fn upload(&self, credential: &Credential, image: &[u8]) -> Result<MediaUpload>;
}

/// Sends one post and hands back the raw response
#[async_trait]
pub trait MessagePoster: Send + Sync {
    /// Post `text` with the given media references attached, in order
    ///
    /// HTTP status codes are not interpreted; any response that arrives is
    /// returned as-is for the caller to inspect.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Transport` or `PlatformError::Timeout` when no
    /// response arrives.
    async fn post(
        &self,
        credential: &Credential,
        text: &str,
        media_ids: &[String],
    ) -> Result<PostResponse>;
}
