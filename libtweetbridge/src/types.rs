//! Core types for Tweetbridge

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::credentials::Credential;
use crate::error::DecodeError;

// ============================================================================
// Inbound events
// ============================================================================

/// A message received from the pub/sub transport
///
/// Field names follow the publisher's wire format (`TwitterConsumerKey`,
/// `Message`, `Images`, ...). Image bytes may arrive base64-encoded or as a
/// JSON array of numbers.
#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InboundEvent {
    pub twitter_consumer_key: String,
    pub twitter_consumer_secret: String,
    pub twitter_access_token: String,
    pub twitter_access_secret: String,
    pub message: String,
    #[serde(deserialize_with = "deserialize_images")]
    pub images: Vec<Vec<u8>>,
    /// Deprecated single-image field, folded into `images` by [`InboundEvent::decode`]
    #[serde(deserialize_with = "deserialize_legacy_image")]
    pub image: Option<Vec<u8>>,
}

impl InboundEvent {
    /// Decode a transport payload
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut event: InboundEvent = serde_json::from_slice(payload)?;
        if let Some(legacy) = event.image.take() {
            event.images.push(legacy);
        }
        Ok(event)
    }

    /// Events without a consumer key carry nothing to act on
    pub fn is_inert(&self) -> bool {
        self.twitter_consumer_key.is_empty()
    }

    /// Split the event into the posting credential, text and images
    pub fn into_parts(self) -> (Credential, String, Vec<Vec<u8>>) {
        let credential = Credential::new(
            self.twitter_consumer_key,
            self.twitter_consumer_secret,
            self.twitter_access_token,
            self.twitter_access_secret,
        );
        (credential, self.message, self.images)
    }
}

impl std::fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundEvent")
            .field("twitter_consumer_key", &self.twitter_consumer_key)
            .field("twitter_consumer_secret", &"[REDACTED]")
            .field("twitter_access_token", &self.twitter_access_token)
            .field("twitter_access_secret", &"[REDACTED]")
            .field("message", &self.message)
            .field("images", &self.images.len())
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireBytes {
    Encoded(String),
    Octets(Vec<u8>),
}

impl WireBytes {
    fn into_bytes(self) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            WireBytes::Encoded(text) => STANDARD.decode(text.as_bytes()),
            WireBytes::Octets(bytes) => Ok(bytes),
        }
    }
}

fn deserialize_images<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<WireBytes>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|bytes| bytes.into_bytes().map_err(serde::de::Error::custom))
        .collect()
}

fn deserialize_legacy_image<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<WireBytes> = Option::deserialize(deserializer)?;
    match raw {
        Some(bytes) => {
            let bytes = bytes.into_bytes().map_err(serde::de::Error::custom)?;
            Ok((!bytes.is_empty()).then_some(bytes))
        }
        None => Ok(None),
    }
}

// ============================================================================
// Media upload
// ============================================================================

/// Response body of the media upload endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaUpload {
    pub media_id: u64,
    pub media_id_string: String,
    pub media_key: String,
    pub size: u64,
    pub expires_after_secs: u64,
    pub image: ImageInfo,
}

impl MediaUpload {
    /// The media reference to embed in a post, if the upload produced one
    pub fn reference(&self) -> Option<&str> {
        if self.media_id_string.is_empty() {
            None
        } else {
            Some(&self.media_id_string)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageInfo {
    pub image_type: String,
    pub w: u32,
    pub h: u32,
}

// ============================================================================
// Outbound posts
// ============================================================================

/// JSON body sent to the tweets endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundPost {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<PostMedia>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostMedia {
    pub media_ids: Vec<String>,
}

impl OutboundPost {
    pub fn new(text: &str, media_ids: &[String]) -> Self {
        let media = if media_ids.is_empty() {
            None
        } else {
            Some(PostMedia {
                media_ids: media_ids.to_vec(),
            })
        };

        Self {
            text: text.to_string(),
            media,
        }
    }
}

/// Unparsed response from the tweets endpoint
#[derive(Debug, Clone, Default)]
pub struct PostResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl PostResponse {
    /// Look up a header value as text (header names are case-insensitive)
    ///
    /// Values that are not visible ASCII read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    #[test]
    fn test_decode_full_event() {
        let payload = br#"{
            "TwitterConsumerKey": "ck",
            "TwitterConsumerSecret": "cs",
            "TwitterAccessToken": "at",
            "TwitterAccessSecret": "as",
            "Message": "hello",
            "Images": ["aGk=", [1, 2, 3]]
        }"#;

        let event = InboundEvent::decode(payload).unwrap();
        assert!(!event.is_inert());
        assert_eq!(event.message, "hello");
        assert_eq!(event.images, vec![b"hi".to_vec(), vec![1, 2, 3]]);

        let (credential, text, images) = event.into_parts();
        assert_eq!(credential.partition_key(), "ck");
        assert_eq!(text, "hello");
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn test_decode_null_images() {
        let payload = br#"{"TwitterConsumerKey": "ck", "Message": "m", "Images": null, "Image": null}"#;
        let event = InboundEvent::decode(payload).unwrap();
        assert!(event.images.is_empty());
    }

    #[test]
    fn test_decode_legacy_image_is_appended() {
        let payload = br#"{"TwitterConsumerKey": "ck", "Images": ["AQ=="], "Image": "Ag=="}"#;
        let event = InboundEvent::decode(payload).unwrap();
        assert_eq!(event.images, vec![vec![1], vec![2]]);
        assert!(event.image.is_none());
    }

    #[test]
    fn test_decode_empty_legacy_image_is_ignored() {
        let payload = br#"{"TwitterConsumerKey": "ck", "Image": ""}"#;
        let event = InboundEvent::decode(payload).unwrap();
        assert!(event.images.is_empty());
    }

    #[test]
    fn test_decode_missing_key_is_inert() {
        let event = InboundEvent::decode(br#"{"Message": "nobody home"}"#).unwrap();
        assert!(event.is_inert());
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let result = InboundEvent::decode(br#"{"TwitterConsumerKey": "ck", "Images": ["***"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert!(InboundEvent::decode(b"not json").is_err());
    }

    #[test]
    fn test_event_debug_redacts_secrets() {
        let payload = br#"{"TwitterConsumerKey": "ck", "TwitterConsumerSecret": "shh", "TwitterAccessSecret": "quiet"}"#;
        let event = InboundEvent::decode(payload).unwrap();
        let debug = format!("{:?}", event);
        assert!(!debug.contains("shh"));
        assert!(!debug.contains("quiet"));
    }

    #[test]
    fn test_media_upload_parses_full_response() {
        let body = r#"{
            "media_id": 710511363345354753,
            "media_id_string": "710511363345354753",
            "media_key": "3_710511363345354753",
            "size": 11065,
            "expires_after_secs": 86400,
            "image": {"image_type": "image/jpeg", "w": 800, "h": 320}
        }"#;

        let upload: MediaUpload = serde_json::from_str(body).unwrap();
        assert_eq!(upload.reference(), Some("710511363345354753"));
        assert_eq!(upload.size, 11065);
        assert_eq!(upload.expires_after_secs, 86400);
        assert_eq!(upload.image.image_type, "image/jpeg");
        assert_eq!((upload.image.w, upload.image.h), (800, 320));
    }

    #[test]
    fn test_media_upload_error_body_has_no_reference() {
        let body = r#"{"errors": [{"code": 324, "message": "Invalid media"}]}"#;
        let upload: MediaUpload = serde_json::from_str(body).unwrap();
        assert_eq!(upload.reference(), None);
    }

    #[test]
    fn test_outbound_post_text_only() {
        let post = OutboundPost::new("hello", &[]);
        assert_eq!(serde_json::to_string(&post).unwrap(), r#"{"text":"hello"}"#);
    }

    #[test]
    fn test_outbound_post_with_media() {
        let post = OutboundPost::new("hi", &["999".to_string(), "1000".to_string()]);
        assert_eq!(
            serde_json::to_string(&post).unwrap(),
            r#"{"text":"hi","media":{"media_ids":["999","1000"]}}"#
        );
    }

    #[test]
    fn test_outbound_post_escapes_text() {
        let post = OutboundPost::new("say \"hi\"\n", &[]);
        assert_eq!(
            serde_json::to_string(&post).unwrap(),
            r#"{"text":"say \"hi\"\n"}"#
        );
    }

    #[test]
    fn test_post_response_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-app-limit-24hour-remaining"),
            HeaderValue::from_static("17"),
        );
        let response = PostResponse {
            status: 201,
            headers,
            body: String::new(),
        };

        assert_eq!(response.header("X-App-Limit-24Hour-Remaining"), Some("17"));
        assert_eq!(response.header("x-app-limit-24hour-reset"), None);
    }
}
