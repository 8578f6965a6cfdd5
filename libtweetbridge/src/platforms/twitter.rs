//! Twitter/X HTTP client
//!
//! Posts go to the v2 tweets endpoint as JSON; images go to the v1.1 media
//! upload endpoint as a single-part multipart form. Both are signed with the
//! OAuth 1.0a credential carried by the inbound event.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::debug;

use crate::config::TwitterConfig;
use crate::credentials::Credential;
use crate::error::{ConfigError, PlatformError, Result};
use crate::oauth::{authorization_header, RequestNonce};
use crate::platforms::{MediaUploader, MessagePoster};
use crate::types::{MediaUpload, OutboundPost, PostResponse};

/// Form field the media endpoint reads the image from
pub const MEDIA_FIELD: &str = "media";

/// Filename sent with every uploaded image
pub const MEDIA_FILENAME: &str = "twitterPicture.jpg";

const MEDIA_UPLOAD_PATH: &str = "/1.1/media/upload.json?media_category=tweet_image";
const TWEETS_PATH: &str = "/2/tweets";

/// Map a reqwest error onto the transport taxonomy
fn map_transport_error(error: reqwest::Error, context: &str) -> PlatformError {
    if error.is_timeout() {
        PlatformError::Timeout(format!("{}: {}", context, error))
    } else {
        PlatformError::Transport(format!("{}: {}", context, error))
    }
}

fn endpoint(base: &str, path: &str, field: &str) -> Result<Url> {
    let url = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse(&url).map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a valid URL: {}", url, e),
        }
        .into()
    })
}

/// HTTP client for the tweets and media upload endpoints
#[derive(Debug, Clone)]
pub struct TwitterClient {
    http: Client,
    tweets_url: Url,
    media_upload_url: Url,
}

impl TwitterClient {
    /// Build a client with the configured endpoints and request timeout
    pub fn new(config: &TwitterConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("tweetbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            tweets_url: endpoint(&config.api_base, TWEETS_PATH, "twitter.api_base")?,
            media_upload_url: endpoint(
                &config.upload_base,
                MEDIA_UPLOAD_PATH,
                "twitter.upload_base",
            )?,
        })
    }

    fn sign(&self, url: &Url, credential: &Credential) -> String {
        authorization_header("POST", url, credential, &RequestNonce::generate())
    }
}

#[async_trait]
impl MediaUploader for TwitterClient {
    async fn upload(&self, credential: &Credential, image: &[u8]) -> Result<MediaUpload> {
        let part = Part::bytes(image.to_vec())
            .file_name(MEDIA_FILENAME)
            .mime_str("application/octet-stream")
            .map_err(|e| PlatformError::Upload(format!("invalid media part: {}", e)))?;
        let form = Form::new().part(MEDIA_FIELD, part);

        let response = self
            .http
            .post(self.media_upload_url.clone())
            .header(AUTHORIZATION, self.sign(&self.media_upload_url, credential))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PlatformError::Upload(map_transport_error(e, "media upload").to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Upload(format!("failed to read upload response: {}", e)))?;

        debug!("Media upload response (HTTP {}): {}", status.as_u16(), body);

        let upload: MediaUpload = serde_json::from_str(&body).map_err(|e| {
            PlatformError::Upload(format!(
                "unexpected upload response (HTTP {}): {}",
                status.as_u16(),
                e
            ))
        })?;

        if upload.reference().is_none() {
            return Err(PlatformError::Upload(format!(
                "no media id in upload response (HTTP {}): {}",
                status.as_u16(),
                body
            ))
            .into());
        }

        Ok(upload)
    }
}

#[async_trait]
impl MessagePoster for TwitterClient {
    async fn post(
        &self,
        credential: &Credential,
        text: &str,
        media_ids: &[String],
    ) -> Result<PostResponse> {
        let payload = OutboundPost::new(text, media_ids);

        let response = self
            .http
            .post(self.tweets_url.clone())
            .header(AUTHORIZATION, self.sign(&self.tweets_url, credential))
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_transport_error(e, "tweet request"))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, "tweet response body"))?;

        Ok(PostResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_default_config() {
        let client = TwitterClient::new(&TwitterConfig::default()).unwrap();
        assert_eq!(client.tweets_url.as_str(), "https://api.twitter.com/2/tweets");
        assert_eq!(
            client.media_upload_url.as_str(),
            "https://upload.twitter.com/1.1/media/upload.json?media_category=tweet_image"
        );
    }

    #[test]
    fn test_endpoints_tolerate_trailing_slash() {
        let config = TwitterConfig {
            api_base: "http://127.0.0.1:8080/".to_string(),
            upload_base: "http://127.0.0.1:8081".to_string(),
            request_timeout_secs: 5,
        };
        let client = TwitterClient::new(&config).unwrap();
        assert_eq!(client.tweets_url.as_str(), "http://127.0.0.1:8080/2/tweets");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let config = TwitterConfig {
            api_base: "not a url".to_string(),
            ..Default::default()
        };
        let err = TwitterClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("twitter.api_base"));
    }

    #[test]
    fn test_signed_header_uses_credential() {
        let client = TwitterClient::new(&TwitterConfig::default()).unwrap();
        let credential = Credential::new("ck", "cs", "at", "as");
        let header = client.sign(&client.tweets_url, &credential);

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_consumer_key=\"ck\""));
        assert!(header.contains("oauth_token=\"at\""));
    }
}
