//! HTTP client for the playback metadata service

use super::models::{ErrorBody, PlaybackResponse, PlayerInformationResponse};
use super::MetadataClient;
use crate::types::{PlayerLicense, VideoDetails};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Default metadata service endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.playback.streamamg.com/v1";

const API_KEY_HEADER: &str = "x-api-key";

/// reqwest-backed metadata client
#[derive(Debug, Clone)]
pub struct PlaybackApiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    user_agent: Option<String>,
}

impl PlaybackApiClient {
    /// Create a client. Fails before any network call when the API key is empty.
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        user_agent: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidConfig(format!("base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!("base URL {base_url} cannot be a base")));
        }

        let client = Client::builder().timeout(timeout).build().map_err(Error::Network)?;

        Ok(Self {
            client,
            base_url,
            api_key,
            user_agent,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, url: Url, user_agent: Option<&str>) -> RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(API_KEY_HEADER, &self.api_key);
        if let Some(agent) = user_agent.filter(|a| !a.trim().is_empty()) {
            request = request.header(USER_AGENT, agent);
        }
        request
    }

    /// Fetch player information (`GET /player`)
    #[instrument(skip(self))]
    pub async fn player_information(&self) -> Result<PlayerInformationResponse> {
        let url = self.endpoint(&["player"]);
        debug!(url = %url, "Fetching player information");

        let response = self.request(url, self.user_agent.as_deref()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| Error::MalformedResponse(e.to_string()))
        } else {
            Err(api_error(status, &body, "Failed to get player information"))
        }
    }

    /// Fetch the player license, requiring a non-empty license key
    pub async fn fetch_license(&self) -> Result<PlayerLicense> {
        self.player_information()
            .await?
            .license()
            .ok_or(Error::MissingLicense)
    }

    /// Fetch playback details for one entry (`GET /entry/{id}`)
    #[instrument(skip(self, authorization_token))]
    pub async fn video_details(
        &self,
        entry_id: &str,
        authorization_token: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<PlaybackResponse> {
        let url = self.endpoint(&["entry", entry_id]);
        debug!(url = %url, "Fetching video details");

        let mut request = self.request(url, user_agent);
        if let Some(token) = authorization_token.filter(|t| !t.trim().is_empty()) {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| Error::MalformedResponse(e.to_string()))
        } else {
            let err = api_error(status, &body, "Failed to get video details");
            warn!(entry_id, status = status.as_u16(), error = %err, "Video details request rejected");
            Err(err)
        }
    }
}

#[async_trait]
impl MetadataClient for PlaybackApiClient {
    async fn resolve(&self, entry_id: &str, authorization_token: Option<&str>) -> Result<VideoDetails> {
        let response = self
            .video_details(entry_id, authorization_token, self.user_agent.as_deref())
            .await?;
        Ok(response.into_video_details(entry_id))
    }
}

/// Build a typed API error from a non-2xx response
fn api_error(status: StatusCode, body: &str, fallback: &str) -> Error {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| match status {
        StatusCode::FORBIDDEN => "API Key not provided or not valid".to_string(),
        _ => fallback.to_string(),
    });
    Error::api(status.as_u16(), message, parsed.reason.as_deref().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackErrorReason;

    fn client(base: &str) -> PlaybackApiClient {
        PlaybackApiClient::new("key", base, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let err = PlaybackApiClient::new("  ", DEFAULT_BASE_URL, None, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = PlaybackApiClient::new("key", "not a url", None, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_endpoint_building() {
        let c = client("https://api.example.com/v1");
        assert_eq!(c.endpoint(&["player"]).as_str(), "https://api.example.com/v1/player");

        let c = client("https://api.example.com/v1/");
        assert_eq!(
            c.endpoint(&["entry", "0_a b"]).as_str(),
            "https://api.example.com/v1/entry/0_a%20b"
        );
    }

    #[test]
    fn test_api_error_mapping() {
        let err = api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Token expired","reason":"TOKEN_ERROR"}"#,
            "fallback",
        );
        match err {
            Error::Api { status, message, reason } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Token expired");
                assert_eq!(reason, PlaybackErrorReason::TokenError);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_defaults() {
        match api_error(StatusCode::FORBIDDEN, "<html>", "fallback") {
            Error::Api { message, reason, .. } => {
                assert_eq!(message, "API Key not provided or not valid");
                assert_eq!(reason, PlaybackErrorReason::Unknown);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        match api_error(StatusCode::INTERNAL_SERVER_ERROR, "", "fallback") {
            Error::Api { message, .. } => assert_eq!(message, "fallback"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
