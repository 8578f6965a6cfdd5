//! Tweetbridge - relay pub/sub messages to Twitter/X
//!
//! This library holds the relay core: decoding inbound events, per-credential
//! rate limiting, media upload, posting, and the dispatcher tying them
//! together. Transport binaries feed payloads to [`Relay::dispatch`].

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod platforms;
pub mod rate_limiter;
pub mod relay;
pub mod types;

// Re-export commonly used types
pub use config::{Config, UploadFailurePolicy};
pub use credentials::Credential;
pub use error::{BridgeError, Result};
pub use rate_limiter::RateLimitRegistry;
pub use relay::{DispatchOutcome, Relay};
pub use types::{InboundEvent, MediaUpload, OutboundPost, PostResponse};
