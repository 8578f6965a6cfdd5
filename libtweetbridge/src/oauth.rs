//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Twitter's user-context endpoints authenticate every request with an
//! `Authorization: OAuth ...` header. Only query-string parameters and the
//! protocol parameters are signed; JSON and multipart bodies are not.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::credentials::Credential;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Per-request values that must be unique for each signed request
#[derive(Debug, Clone)]
pub struct RequestNonce {
    pub nonce: String,
    pub timestamp: i64,
}

impl RequestNonce {
    /// A random 32-character nonce stamped with the current time
    pub fn generate() -> Self {
        let nonce = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        Self {
            nonce,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn protocol_params(credential: &Credential, nonce: &RequestNonce) -> Vec<(String, String)> {
    vec![
        ("oauth_consumer_key".to_string(), credential.consumer_key().to_string()),
        ("oauth_nonce".to_string(), nonce.nonce.clone()),
        ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
        ("oauth_timestamp".to_string(), nonce.timestamp.to_string()),
        ("oauth_token".to_string(), credential.access_token().to_string()),
        ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
    ]
}

/// Build the signature base string for a request
///
/// `body_params` holds form-encoded body parameters; pass an empty slice for
/// JSON or multipart bodies.
pub fn signature_base_string(
    method: &str,
    url: &Url,
    body_params: &[(&str, &str)],
    credential: &Credential,
    nonce: &RequestNonce,
) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(body_params.iter().map(|(k, v)| (encode(k), encode(v))))
        .chain(
            protocol_params(credential, nonce)
                .into_iter()
                .map(|(k, v)| (encode(&k), encode(&v))),
        )
        .collect();
    params.sort();

    let param_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(base_url.as_str()),
        encode(&param_string)
    )
}

/// Compute the base64 HMAC-SHA1 signature for a request
pub fn sign(
    method: &str,
    url: &Url,
    body_params: &[(&str, &str)],
    credential: &Credential,
    nonce: &RequestNonce,
) -> String {
    let base = signature_base_string(method, url, body_params, credential, nonce);
    let key = Zeroizing::new(format!(
        "{}&{}",
        encode(credential.consumer_secret()),
        encode(credential.access_secret())
    ));

    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Build the `Authorization` header value for a request
pub fn authorization_header(
    method: &str,
    url: &Url,
    credential: &Credential,
    nonce: &RequestNonce,
) -> String {
    let signature = sign(method, url, &[], credential, nonce);

    let mut params = protocol_params(credential, nonce);
    params.push(("oauth_signature".to_string(), signature));
    params.sort();

    let fields = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("OAuth {}", fields)
}
