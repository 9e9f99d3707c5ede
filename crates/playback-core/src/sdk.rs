//! SDK entry point
//!
//! [`PlaybackSdk::initialize`] validates the API key, fetches the player
//! license and hands out the pieces a host needs: the metadata client,
//! playback sessions and player surfaces.

use crate::{
    api::{resolve_all, BatchResolution, MetadataClient, PlaybackApiClient, DEFAULT_BASE_URL},
    engine::EngineFactory,
    plugin::{HostSurface, PluginRegistry},
    service::ServiceHost,
    session::PlaybackSession,
    surface::PlaybackSurface,
    types::{PlayerLicense, VideoDetails},
    Error, Result, VERSION,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// SDK configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SdkConfig {
    /// API key sent with every metadata request
    pub api_key: String,
    /// Metadata service base URL
    pub base_url: String,
    /// User agent for metadata requests
    pub user_agent: Option<String>,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: Some(format!("playback-sdk-rust/{VERSION}")),
            request_timeout_ms: 10_000,
        }
    }
}

impl SdkConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// An initialized SDK holding the player license
pub struct PlaybackSdk {
    config: SdkConfig,
    client: Arc<PlaybackApiClient>,
    license: PlayerLicense,
    registry: PluginRegistry,
}

impl PlaybackSdk {
    /// Validate the API key and fetch the player license.
    ///
    /// An empty API key fails before any network call.
    #[instrument(skip(config), fields(base_url = %config.base_url))]
    pub async fn initialize(config: SdkConfig) -> Result<Self> {
        let client = PlaybackApiClient::new(
            config.api_key.clone(),
            &config.base_url,
            config.user_agent.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )?;

        let license = match client.fetch_license().await {
            Ok(license) => license,
            Err(Error::MissingLicense) => return Err(Error::MissingLicense),
            Err(e) => {
                warn!(error = %e, "Player license fetch failed");
                return Err(Error::LicenseFetch(e.to_string()));
            }
        };

        info!(
            analytics = license.analytics_key.is_some(),
            player = license.player_name.as_deref().unwrap_or("-"),
            "Playback SDK initialized"
        );

        Ok(Self {
            config,
            client: Arc::new(client),
            license,
            registry: PluginRegistry::new(),
        })
    }

    pub fn version() -> &'static str {
        VERSION
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn license(&self) -> &PlayerLicense {
        &self.license
    }

    pub fn client(&self) -> Arc<PlaybackApiClient> {
        Arc::clone(&self.client)
    }

    pub fn metadata(&self) -> Arc<dyn MetadataClient> {
        self.client()
    }

    /// Registry shared by every surface this SDK creates
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Resolve one entry
    pub async fn load_hls_stream(&self, entry_id: &str, authorization_token: Option<&str>) -> Result<VideoDetails> {
        self.client.resolve(entry_id, authorization_token).await
    }

    /// Resolve many entries concurrently, keeping request order
    pub async fn load_all_hls_streams(&self, entry_ids: &[String], authorization_token: Option<&str>) -> BatchResolution {
        resolve_all(self.metadata(), entry_ids, authorization_token).await
    }

    /// New playback session licensed by this SDK
    pub fn session(&self, engine_factory: Arc<dyn EngineFactory>, service_host: Arc<dyn ServiceHost>) -> PlaybackSession {
        PlaybackSession::new(self.license.clone(), self.metadata(), engine_factory, service_host)
    }

    /// New player surface bound to the SDK registry
    pub fn surface(&self, host: Arc<dyn HostSurface>) -> PlaybackSurface {
        PlaybackSurface::new(self.metadata(), self.registry.clone(), host)
    }
}
