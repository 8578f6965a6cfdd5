//! Mock platform implementations for testing
//!
//! Configurable doubles for [`MediaUploader`] and [`MessagePoster`] that record
//! every call. They are available in all builds (not just tests) so that
//! integration tests can drive the relay without network access.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::credentials::Credential;
use crate::error::{PlatformError, Result};
use crate::platforms::{MediaUploader, MessagePoster};
use crate::types::{MediaUpload, OutboundPost, PostResponse};

/// One recorded upload call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    pub consumer_key: String,
    pub image: Vec<u8>,
}

/// Mock media uploader
///
/// Replies are consumed in order; once exhausted, every further upload
/// succeeds with an id derived from the call number (`"media-1"`, ...).
#[derive(Clone, Default)]
pub struct MockUploader {
    replies: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    calls: Arc<Mutex<Vec<UploadCall>>>,
}

impl MockUploader {
    /// An uploader whose uploads always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// An uploader that returns the given media ids in order
    pub fn with_ids(ids: &[&str]) -> Self {
        let uploader = Self::new();
        for id in ids {
            uploader.push_success(id);
        }
        uploader
    }

    /// An uploader whose next upload fails
    pub fn failing(error: &str) -> Self {
        let uploader = Self::new();
        uploader.push_failure(error);
        uploader
    }

    pub fn push_success(&self, media_id: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(media_id.to_string()));
    }

    pub fn push_failure(&self, error: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(error.to_string()));
    }

    /// Get the number of times upload was called
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Get every recorded upload
    pub fn calls(&self) -> Vec<UploadCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaUploader for MockUploader {
    async fn upload(&self, credential: &Credential, image: &[u8]) -> Result<MediaUpload> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(UploadCall {
                consumer_key: credential.consumer_key().to_string(),
                image: image.to_vec(),
            });
            calls.len()
        };

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("media-{}", call_number)));

        match reply {
            Ok(media_id) => Ok(MediaUpload {
                media_id: media_id.parse().unwrap_or_default(),
                media_id_string: media_id,
                size: image.len() as u64,
                expires_after_secs: 86400,
                ..Default::default()
            }),
            Err(error) => Err(PlatformError::Upload(error).into()),
        }
    }
}

/// One recorded post call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCall {
    pub consumer_key: String,
    pub text: String,
    pub media_ids: Vec<String>,
    /// The JSON body the real client would have sent
    pub payload: String,
}

/// Mock message poster
#[derive(Clone)]
pub struct MockPoster {
    response: Arc<Mutex<std::result::Result<PostResponse, PlatformError>>>,
    calls: Arc<Mutex<Vec<PostCall>>>,
}

impl Default for MockPoster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPoster {
    /// A poster that answers `201 Created` with no rate-limit headers
    pub fn new() -> Self {
        Self::responding(MockResponse::created().build())
    }

    /// A poster that always returns `response`
    pub fn responding(response: PostResponse) -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(response))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A poster whose requests never get a response
    pub fn transport_failure(error: &str) -> Self {
        Self {
            response: Arc::new(Mutex::new(Err(PlatformError::Transport(error.to_string())))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the response returned by later calls
    pub fn set_response(&self, response: PostResponse) {
        *self.response.lock().unwrap() = Ok(response);
    }

    /// Get the number of times post was called
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Get every recorded post
    pub fn calls(&self) -> Vec<PostCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePoster for MockPoster {
    async fn post(
        &self,
        credential: &Credential,
        text: &str,
        media_ids: &[String],
    ) -> Result<PostResponse> {
        let payload = serde_json::to_string(&OutboundPost::new(text, media_ids))
            .map_err(|e| PlatformError::Transport(format!("payload encoding: {}", e)))?;

        self.calls.lock().unwrap().push(PostCall {
            consumer_key: credential.consumer_key().to_string(),
            text: text.to_string(),
            media_ids: media_ids.to_vec(),
            payload,
        });

        self.response.lock().unwrap().clone().map_err(Into::into)
    }
}

/// Builder for canned post responses
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: HeaderMap,
    body: String,
}

impl MockResponse {
    pub fn created() -> Self {
        Self {
            status: 201,
            headers: HeaderMap::new(),
            body: r#"{"data":{"id":"1445880548472328192","text":"hello"}}"#.to_string(),
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// Add a header; invalid names or values are skipped
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn build(self) -> PostResponse {
        PostResponse {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::new("ck", "cs", "at", "as")
    }

    #[tokio::test]
    async fn test_mock_uploader_replies_in_order() {
        let uploader = MockUploader::with_ids(&["111", "222"]);

        let first = uploader.upload(&credential(), b"one").await.unwrap();
        let second = uploader.upload(&credential(), b"two").await.unwrap();
        let third = uploader.upload(&credential(), b"three").await.unwrap();

        assert_eq!(first.reference(), Some("111"));
        assert_eq!(first.media_id, 111);
        assert_eq!(second.reference(), Some("222"));
        assert_eq!(third.reference(), Some("media-3"));
        assert_eq!(uploader.call_count(), 3);
        assert_eq!(uploader.calls()[1].image, b"two".to_vec());
    }

    #[tokio::test]
    async fn test_mock_uploader_failure() {
        let uploader = MockUploader::failing("media endpoint down");

        let result = uploader.upload(&credential(), b"img").await;
        assert!(result.unwrap_err().to_string().contains("media endpoint down"));
        assert_eq!(uploader.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_poster_records_payload() {
        let poster = MockPoster::new();

        let response = poster
            .post(&credential(), "hi", &["999".to_string()])
            .await
            .unwrap();
        assert_eq!(response.status, 201);

        let calls = poster.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].consumer_key, "ck");
        assert_eq!(calls[0].payload, r#"{"text":"hi","media":{"media_ids":["999"]}}"#);
    }

    #[tokio::test]
    async fn test_mock_poster_transport_failure() {
        let poster = MockPoster::transport_failure("connection reset");

        let result = poster.post(&credential(), "hi", &[]).await;
        assert!(result.unwrap_err().to_string().contains("connection reset"));
        assert_eq!(poster.call_count(), 1);
    }

    #[test]
    fn test_mock_response_builder() {
        let response = MockResponse::created()
            .status(429)
            .body("Too Many Requests")
            .header("X-App-Limit-24Hour-Remaining", "0")
            .build();

        assert_eq!(response.status, 429);
        assert_eq!(response.body, "Too Many Requests");
        assert_eq!(response.header("x-app-limit-24hour-remaining"), Some("0"));
    }
}
