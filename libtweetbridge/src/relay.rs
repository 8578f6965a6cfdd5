//! Relay dispatcher
//!
//! Turns one inbound event into zero or one outbound post:
//!
//! ```text
//! Received -> Filtered                       (no consumer key)
//!          -> Blocked                        (key is rate limited)
//!          -> Uploading x N -> Posting -> Done | Failed
//! ```
//!
//! After a post the response is inspected for limiting signals and the
//! rate-limit registry is updated. No outcome is fatal to the caller; each
//! dispatch reports what happened through [`DispatchOutcome`].

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::UploadFailurePolicy;
use crate::credentials::Credential;
use crate::error::{BridgeError, PlatformError, Result};
use crate::platforms::{MediaUploader, MessagePoster};
use crate::rate_limiter::{RateLimitRegistry, RateLimitSignals, THROTTLE_WINDOW_SECS};
use crate::types::{InboundEvent, PostResponse};

/// Source of the current time in seconds since the epoch
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Terminal state of one dispatch
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The event had no consumer key and was dropped
    Filtered,
    /// The consumer key is rate limited until `reset_at`
    Blocked { reset_at: i64 },
    /// A post was sent and its response inspected
    Posted {
        status: u16,
        media_attached: usize,
        /// Reset time recorded for the key after this post, if any
        throttled_until: Option<i64>,
    },
    /// The event could not be completed
    Failed(BridgeError),
}

impl DispatchOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, DispatchOutcome::Posted { .. })
    }
}

/// Orchestrates rate-limit checks, media uploads and posting
pub struct Relay {
    registry: Arc<RateLimitRegistry>,
    uploader: Arc<dyn MediaUploader>,
    poster: Arc<dyn MessagePoster>,
    upload_policy: UploadFailurePolicy,
    clock: Arc<dyn Clock>,
}

impl Relay {
    /// Create a relay with an empty registry, the degrade upload policy and
    /// the system clock
    pub fn new(uploader: Arc<dyn MediaUploader>, poster: Arc<dyn MessagePoster>) -> Self {
        Self {
            registry: Arc::new(RateLimitRegistry::new()),
            uploader,
            poster,
            upload_policy: UploadFailurePolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_upload_policy(mut self, policy: UploadFailurePolicy) -> Self {
        self.upload_policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_registry(mut self, registry: Arc<RateLimitRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<RateLimitRegistry> {
        &self.registry
    }

    pub fn upload_policy(&self) -> UploadFailurePolicy {
        self.upload_policy
    }

    /// Drop registry entries for keys whose block has lapsed
    ///
    /// Keys that never post again are otherwise never checked, so their
    /// entries would stay in the map.
    pub fn purge_expired(&self) -> usize {
        let purged = self.registry.purge_expired(self.clock.now());
        if purged > 0 {
            debug!("Purged {} expired rate-limit entries", purged);
        }
        purged
    }

    /// Decode a transport payload and dispatch it
    pub async fn dispatch(&self, payload: &[u8]) -> DispatchOutcome {
        match InboundEvent::decode(payload) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                warn!("Dropping undecodable event: {}", e);
                DispatchOutcome::Failed(e.into())
            }
        }
    }

    /// Dispatch an already decoded event
    pub async fn handle_event(&self, event: InboundEvent) -> DispatchOutcome {
        if event.is_inert() {
            debug!("Dropping event without credentials");
            return DispatchOutcome::Filtered;
        }

        let (credential, text, images) = event.into_parts();
        let key = credential.partition_key();

        if let Some(reset_at) = self.registry.is_blocked(key, self.clock.now()) {
            info!("[Rate Limited] {}: {}", key, reset_at);
            return DispatchOutcome::Blocked { reset_at };
        }

        let media_ids = match self.upload_images(&credential, &images).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Abandoning event for {}: {}", key, e);
                return DispatchOutcome::Failed(e);
            }
        };

        let response = match self.poster.post(&credential, &text, &media_ids).await {
            Ok(response) => response,
            Err(e) => {
                error!("Post for {} was lost: {}", key, e);
                return DispatchOutcome::Failed(e);
            }
        };

        debug!("Tweet (HTTP {}): {}", response.status, response.body);

        match self.apply_rate_limits(key, &response) {
            Ok(throttled_until) => DispatchOutcome::Posted {
                status: response.status,
                media_attached: media_ids.len(),
                throttled_until,
            },
            Err(e) => {
                warn!("Skipping rate-limit update for {}: {}", key, e);
                DispatchOutcome::Failed(e)
            }
        }
    }

    /// Upload every image in order, collecting usable media references
    async fn upload_images(&self, credential: &Credential, images: &[Vec<u8>]) -> Result<Vec<String>> {
        let mut media_ids = Vec::with_capacity(images.len());

        for (index, image) in images.iter().enumerate() {
            let reference = match self.uploader.upload(credential, image).await {
                Ok(upload) => upload.reference().map(str::to_string),
                Err(e) => match self.upload_policy {
                    UploadFailurePolicy::FailClosed => return Err(e),
                    UploadFailurePolicy::Degrade => {
                        warn!(
                            "Image {} of {} failed to upload, posting without it: {}",
                            index + 1,
                            images.len(),
                            e
                        );
                        None
                    }
                },
            };

            match reference {
                Some(id) => media_ids.push(id),
                None if self.upload_policy == UploadFailurePolicy::FailClosed => {
                    return Err(PlatformError::Upload(format!(
                        "image {} produced no media id",
                        index + 1
                    ))
                    .into());
                }
                None => {}
            }
        }

        Ok(media_ids)
    }

    /// Record throttles signalled by a post response
    ///
    /// A "Too Many Requests" body blocks the key for an hour; an exhausted
    /// daily quota blocks it until the quota resets, replacing the hourly
    /// block. Malformed quota headers leave the registry untouched.
    fn apply_rate_limits(&self, key: &str, response: &PostResponse) -> Result<Option<i64>> {
        let signals = RateLimitSignals::from_response(response)?;
        let mut throttled_until = None;

        if signals.too_many_requests {
            let reset_at = self.clock.now() + THROTTLE_WINDOW_SECS;
            info!("Too many requests for {}, pausing until {}", key, reset_at);
            self.registry.record_throttle(key, reset_at);
            throttled_until = Some(reset_at);
        }

        if let Some(reset_at) = signals.daily_reset() {
            info!("Daily quota exhausted for {}, pausing until {}", key, reset_at);
            self.registry.record_throttle(key, reset_at);
            throttled_until = Some(reset_at);
        }

        Ok(throttled_until)
    }
}
