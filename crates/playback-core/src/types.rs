//! Core types for Playback Core

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

/// Carried-metadata key holding the entry identifier
pub const ENTRY_ID_KEY: &str = "entryId";
/// Carried-metadata key holding the authorization token
pub const AUTHORIZATION_TOKEN_KEY: &str = "authorizationToken";
/// Carried-metadata key holding a rendering of the source details
pub const DETAILS_KEY: &str = "details";

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One playable item resolved from the metadata service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    /// Entry identifier, unique within a playlist
    pub id: String,
    /// Playable manifest URL. `None` means unresolved.
    pub url: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
}

impl VideoDetails {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: Some(url.into()),
            title: None,
            thumbnail: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True when a non-empty manifest URL is present
    pub fn is_playable(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

impl std::fmt::Display for VideoDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VideoDetails(id={}, url={}, title={}, thumbnail={}, description={})",
            self.id,
            self.url.as_deref().unwrap_or("-"),
            self.title.as_deref().unwrap_or("-"),
            self.thumbnail.as_deref().unwrap_or("-"),
            self.description.as_deref().unwrap_or("-"),
        )
    }
}

/// Playback behaviour supplied once at plugin setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    pub autoplay_enabled: bool,
    pub background_playback_enabled: bool,
    pub fullscreen_rotation_enabled: bool,
    pub fullscreen_enabled: bool,
    pub skip_back_forward_button: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay_enabled: true,
            background_playback_enabled: true,
            fullscreen_rotation_enabled: true,
            fullscreen_enabled: true,
            skip_back_forward_button: false,
        }
    }
}

impl PlaybackConfig {
    /// Engine options implied by this config, before host overrides
    pub fn engine_defaults(&self) -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("fullscreenEnabled".into(), Value::Bool(self.fullscreen_enabled));
        options.insert(
            "skipBackForwardButton".into(),
            Value::Bool(self.skip_back_forward_button),
        );
        options.insert(
            "backgroundPlaybackEnabled".into(),
            Value::Bool(self.background_playback_enabled),
        );
        options
    }
}

/// Plugin-level configuration wrapper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoPlayerConfig {
    pub playback_config: PlaybackConfig,
}

impl VideoPlayerConfig {
    pub fn new(playback_config: PlaybackConfig) -> Self {
        Self { playback_config }
    }
}

/// Analytics metadata attached to a source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalytics {
    pub title: Option<String>,
    pub video_id: String,
    pub custom_data1: Option<String>,
}

/// Engine-level source wrapping one [`VideoDetails`]
///
/// The carried metadata is the only link between an engine source and the
/// application entry it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSource {
    pub url: Url,
    pub title: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub analytics: SourceAnalytics,
}

impl PlaylistSource {
    /// Build a source, or `None` when the details carry no usable URL
    pub fn from_details(details: &VideoDetails, authorization_token: Option<&str>) -> Option<Self> {
        let raw = details.url.as_deref().filter(|u| !u.is_empty())?;
        let url = Url::parse(raw).ok()?;

        let mut metadata = BTreeMap::new();
        if !details.id.is_empty() {
            metadata.insert(ENTRY_ID_KEY.to_string(), details.id.clone());
        }
        metadata.insert(DETAILS_KEY.to_string(), details.to_string());
        if let Some(token) = authorization_token {
            metadata.insert(AUTHORIZATION_TOKEN_KEY.to_string(), token.to_string());
        }

        Some(Self {
            url,
            title: details.title.clone(),
            metadata,
            analytics: SourceAnalytics {
                title: details.title.clone(),
                video_id: details.id.clone(),
                custom_data1: details.description.clone(),
            },
        })
    }

    pub fn entry_id(&self) -> Option<&str> {
        self.metadata.get(ENTRY_ID_KEY).map(String::as_str)
    }

    pub fn authorization_token(&self) -> Option<&str> {
        self.metadata.get(AUTHORIZATION_TOKEN_KEY).map(String::as_str)
    }
}

/// Playlist loading options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistOptions {
    /// Buffer every source up front instead of only the active one
    pub preload_all_sources: bool,
}

/// A playlist handed to the engine in one `load`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistConfig {
    pub sources: Vec<PlaylistSource>,
    pub options: PlaylistOptions,
}

/// Raw events emitted by a player engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// The loaded playlist is ready to play
    Ready,
    /// Playback started or resumed
    Play,
    /// Playback paused
    Paused,
    /// Playback failed on the active source
    Error { message: String },
    /// The active source changed
    PlaylistTransition {
        from: Option<String>,
        to: Option<String>,
    },
    /// The last source finished
    PlaybackFinished,
}

/// Playback session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No playlist has been loaded yet
    Uninitialized,
    /// Playlist handed to the engine, waiting for Ready
    Loading,
    /// Engine reported Ready
    Ready,
    Playing,
    Paused,
    /// Loading failed before the engine became ready
    Error,
    /// Terminal
    Destroyed,
}

impl SessionState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        if target == Destroyed {
            return *self != Destroyed;
        }
        matches!(
            (self, target),
            // From Uninitialized
            (Uninitialized, Loading) |
            // From Loading
            (Loading, Ready) | (Loading, Error) | (Loading, Loading) |
            // From Ready
            (Ready, Playing) | (Ready, Paused) | (Ready, Loading) |
            // From Playing
            (Playing, Paused) | (Playing, Loading) |
            // From Paused
            (Paused, Playing) | (Paused, Loading) |
            // From Error
            (Error, Loading)
        )
    }

    /// The engine has reported Ready for the current playlist
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Playing | SessionState::Paused)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Loading => write!(f, "loading"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Error => write!(f, "error"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Link between a session and the background playback service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceLink {
    Unbound,
    /// Bind requested, connection not yet delivered
    Binding,
    Bound,
}

impl ServiceLink {
    /// A bind is live or in flight
    pub fn is_linked(&self) -> bool {
        !matches!(self, ServiceLink::Unbound)
    }
}

/// Player license obtained from the metadata service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLicense {
    pub license_key: String,
    pub analytics_key: Option<String>,
    pub player_name: Option<String>,
}

impl PlayerLicense {
    pub fn new(license_key: impl Into<String>) -> Self {
        Self {
            license_key: license_key.into(),
            analytics_key: None,
            player_name: None,
        }
    }
}

/// Engine analytics sub-config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalyticsConfig {
    Enabled {
        key: String,
        viewer_id: Option<String>,
    },
    Disabled,
}

impl AnalyticsConfig {
    /// Enabled only when an analytics key is available
    pub fn for_key(key: Option<&str>, viewer_id: Option<&str>) -> Self {
        match key {
            Some(key) if !key.is_empty() => AnalyticsConfig::Enabled {
                key: key.to_string(),
                viewer_id: viewer_id.map(str::to_string),
            },
            _ => AnalyticsConfig::Disabled,
        }
    }
}

/// Everything an engine factory needs to build an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub license_key: String,
    pub options: Map<String, Value>,
    pub analytics: AnalyticsConfig,
}

impl EngineConfig {
    /// Merge session defaults with a host-supplied engine sub-config.
    /// Keys present in `overrides` win.
    pub fn merged(
        license: &PlayerLicense,
        defaults: Map<String, Value>,
        overrides: Option<&Map<String, Value>>,
        viewer_id: Option<&str>,
    ) -> Self {
        let mut options = defaults;
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                options.insert(key.clone(), value.clone());
            }
        }

        Self {
            license_key: license.license_key.clone(),
            options,
            analytics: AnalyticsConfig::for_key(license.analytics_key.as_deref(), viewer_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_config_defaults() {
        let config = PlaybackConfig::default();
        assert!(config.autoplay_enabled);
        assert!(config.background_playback_enabled);
        assert!(config.fullscreen_rotation_enabled);
        assert!(config.fullscreen_enabled);
        assert!(!config.skip_back_forward_button);
    }

    #[test]
    fn test_playback_config_partial_json() {
        let config: VideoPlayerConfig =
            serde_json::from_str(r#"{"playbackConfig":{"autoplayEnabled":false}}"#).unwrap();
        assert!(!config.playback_config.autoplay_enabled);
        assert!(config.playback_config.background_playback_enabled);
    }

    #[test]
    fn test_source_carries_entry_metadata() {
        let details = VideoDetails::new("0_abc", "https://cdn.example.com/a/master.m3u8")
            .with_title("Match highlights")
            .with_description("Round 4");
        let source = PlaylistSource::from_details(&details, Some("token-1")).unwrap();

        assert_eq!(source.entry_id(), Some("0_abc"));
        assert_eq!(source.authorization_token(), Some("token-1"));
        assert!(source.metadata.contains_key(DETAILS_KEY));
        assert_eq!(source.analytics.custom_data1.as_deref(), Some("Round 4"));
    }

    #[test]
    fn test_source_rejects_missing_or_invalid_url() {
        let mut details = VideoDetails::new("e1", "");
        assert!(PlaylistSource::from_details(&details, None).is_none());

        details.url = None;
        assert!(PlaylistSource::from_details(&details, None).is_none());

        details.url = Some("not a url".into());
        assert!(PlaylistSource::from_details(&details, None).is_none());
    }

    #[test]
    fn test_source_without_id_has_no_entry_key() {
        let details = VideoDetails::new("", "https://cdn.example.com/x.m3u8");
        let source = PlaylistSource::from_details(&details, None).unwrap();
        assert_eq!(source.entry_id(), None);
        assert_eq!(source.authorization_token(), None);
    }

    #[test]
    fn test_session_state_transitions() {
        use SessionState::*;
        assert!(Uninitialized.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Loading));
        assert!(Playing.can_transition_to(Destroyed));

        assert!(!Uninitialized.can_transition_to(Playing));
        assert!(!Loading.can_transition_to(Playing));
        assert!(!Destroyed.can_transition_to(Loading));
        assert!(!Destroyed.can_transition_to(Destroyed));
    }

    #[test]
    fn test_engine_config_merge() {
        let mut license = PlayerLicense::new("lic");
        let defaults = PlaybackConfig::default().engine_defaults();

        let mut overrides = Map::new();
        overrides.insert("fullscreenEnabled".into(), Value::Bool(false));
        overrides.insert("bufferSeconds".into(), Value::from(30));

        let config = EngineConfig::merged(&license, defaults.clone(), Some(&overrides), None);
        assert_eq!(config.options["fullscreenEnabled"], Value::Bool(false));
        assert_eq!(config.options["bufferSeconds"], Value::from(30));
        assert_eq!(config.analytics, AnalyticsConfig::Disabled);

        license.analytics_key = Some("env-key".into());
        let config = EngineConfig::merged(&license, defaults, None, Some("viewer-9"));
        assert_eq!(
            config.analytics,
            AnalyticsConfig::Enabled {
                key: "env-key".into(),
                viewer_id: Some("viewer-9".into())
            }
        );
    }
}
