use std::time::Duration;

use url::Url;

/// Hostname suffixes KakaoClient is allowed to POST to. A suffix match requires the dot
/// boundary, so `faketalkakao.com` does not match `.kakao.com`.
const ALLOWED_HOST_SUFFIXES: &[&str] = &[".kakao.com", ".kakaocdn.net", ".kakaoenterprise.com"];

const CALLBACK_TIMEOUT_SECS: u64 = 5;

#[derive(Debug)]
pub enum CallbackError {
    /// The URL was rejected before any network call was attempted (bad scheme or host).
    Blocked(String),
    /// The request was sent but failed (non-2xx, transport error, or timeout).
    Failed { message: String, is_timeout: bool },
}

impl CallbackError {
    pub fn message(&self) -> String {
        match self {
            CallbackError::Blocked(m) => m.clone(),
            CallbackError::Failed { message, .. } => message.clone(),
        }
    }
}

/// Outbound HTTPS client used to deliver agent replies to a KakaoTalk callback URL.
pub struct KakaoClient {
    http: reqwest::Client,
}

impl Default for KakaoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl KakaoClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CALLBACK_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        KakaoClient { http }
    }

    /// POST `payload` to `callback_url`. Rejects synchronously if the URL's scheme or host
    /// fails the allowlist; otherwise sends with a 5s timeout.
    pub async fn send_callback(
        &self,
        callback_url: &str,
        payload: &serde_json::Value,
    ) -> Result<(), CallbackError> {
        let url = Url::parse(callback_url)
            .map_err(|e| CallbackError::Blocked(format!("invalid callback url: {e}")))?;

        if url.scheme() != "https" {
            return Err(CallbackError::Blocked(format!(
                "rejected non-https scheme: {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| CallbackError::Blocked("callback url has no host".to_string()))?;

        if !is_allowed_host(host) {
            return Err(CallbackError::Blocked(format!(
                "host {host} is not in the kakao allowlist"
            )));
        }

        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| CallbackError::Failed {
                is_timeout: e.is_timeout(),
                message: format!("callback request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(CallbackError::Failed {
                is_timeout: false,
                message: format!("callback returned HTTP {}", response.status()),
            });
        }

        Ok(())
    }
}

fn is_allowed_host(host: &str) -> bool {
    ALLOWED_HOST_SUFFIXES.iter().any(|suffix| {
        host == &suffix[1..] || host.ends_with(suffix)
    })
}
