//! Player plugins and the registry that selects one
//!
//! A plugin is what host applications drive: it mounts a player view for a
//! list of resolved entries and exposes transport and playlist controls.
//! [`EnginePlayerPlugin`] is the default plugin, backed by a
//! [`PlaybackSession`].

use crate::{
    engine::EngineHandle,
    session::{InitializeRequest, PlaybackSession},
    types::{PlayerEvent, VideoDetails, VideoPlayerConfig},
    Error, Result,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// How the host embeds the player view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// Declarative UI tree. Disposing the view tears the service down.
    Composable,
    /// View embedded in a classic view hierarchy. Disposing the view only
    /// backgrounds playback.
    Embedded,
}

/// Lifecycle signals delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    Resume,
    Pause,
    Stop,
}

impl LifecycleEvent {
    /// The host became visible
    pub fn is_foreground(&self) -> bool {
        matches!(self, LifecycleEvent::Start | LifecycleEvent::Resume)
    }
}

/// Host-platform capability used by the player view
#[async_trait]
pub trait HostSurface: Send + Sync {
    fn kind(&self) -> HostKind;

    /// Whether posting the playback notification needs a runtime permission
    fn requires_notification_permission(&self) -> bool {
        false
    }

    /// Ask the user for the notification permission
    async fn request_notification_permission(&self) -> bool {
        true
    }

    /// Attach the engine's rendering output to the host view
    fn attach_view(&self, engine: EngineHandle);
}

/// Host surface with no real view, for CLI sessions and tests
#[derive(Debug)]
pub struct HeadlessHost {
    kind: HostKind,
    /// `None` when no permission is required
    permission: Option<bool>,
    attached: Mutex<usize>,
}

impl HeadlessHost {
    pub fn new(kind: HostKind) -> Self {
        Self {
            kind,
            permission: None,
            attached: Mutex::new(0),
        }
    }

    /// Require the notification permission and answer requests with `granted`
    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission = Some(granted);
        self
    }

    /// Number of view attachments so far
    pub fn attachments(&self) -> usize {
        *self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HostSurface for HeadlessHost {
    fn kind(&self) -> HostKind {
        self.kind
    }

    fn requires_notification_permission(&self) -> bool {
        self.permission.is_some()
    }

    async fn request_notification_permission(&self) -> bool {
        self.permission.unwrap_or(true)
    }

    fn attach_view(&self, _engine: EngineHandle) {
        *self.attached.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        debug!("Headless view attached");
    }
}

/// Arguments of [`VideoPlayerPlugin::player_view`]
#[derive(Debug, Clone, Default)]
pub struct PlayerViewRequest {
    pub video_details: Vec<VideoDetails>,
    pub entry_id_to_play: Option<String>,
    pub authorization_token: Option<String>,
    pub analytics_viewer_id: Option<String>,
    pub engine_options: Option<Map<String, Value>>,
}

impl PlayerViewRequest {
    pub fn new(video_details: Vec<VideoDetails>) -> Self {
        Self {
            video_details,
            ..Default::default()
        }
    }
}

/// A mounted player view. Forwards host lifecycle signals to the session.
pub struct PlayerMount {
    session: PlaybackSession,
    host: Arc<dyn HostSurface>,
    playable: usize,
}

impl PlayerMount {
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Playable sources loaded for this mount
    pub fn playable(&self) -> usize {
        self.playable
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_player_ready()
    }

    pub async fn engine(&self) -> Option<EngineHandle> {
        self.session.engine().await
    }

    pub async fn on_lifecycle(&self, event: LifecycleEvent) -> Result<()> {
        debug!(?event, "Host lifecycle event");
        if event.is_foreground() {
            self.session.handle_app_in_foreground().await
        } else {
            self.session.handle_app_in_background().await
        }
    }

    /// The host removed the view
    pub async fn dispose(self) -> Result<()> {
        match self.host.kind() {
            HostKind::Composable => self.session.unbind_and_stop_service().await,
            HostKind::Embedded => self.session.handle_app_in_background().await,
        }
    }
}

/// Trait for swappable player implementations
#[async_trait]
pub trait VideoPlayerPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    async fn setup(&self, config: VideoPlayerConfig);

    /// Load `request` and mount the player on `host`
    async fn player_view(&self, request: PlayerViewRequest, host: Arc<dyn HostSurface>) -> Result<PlayerMount>;

    async fn play(&self);

    async fn pause(&self);

    async fn play_next(&self);

    async fn play_previous(&self);

    async fn play_first(&self);

    async fn play_last(&self);

    /// Jump to `entry_id` with a freshly resolved source. True on success.
    async fn seek(&self, entry_id: &str) -> bool;

    async fn active_entry_id(&self) -> Option<String>;

    /// Release the engine
    async fn remove_player(&self);

    /// Stop background playback and forget the loaded playlist
    async fn clean(&self);

    /// Raw engine events
    fn events(&self) -> broadcast::Receiver<PlayerEvent>;
}

/// Single-slot plugin registry. Clones share the slot; the last
/// registration wins.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    slot: Arc<RwLock<Option<Arc<dyn VideoPlayerPlugin>>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `plugin`, returning the one it replaced
    pub fn register_plugin(&self, plugin: Arc<dyn VideoPlayerPlugin>) -> Option<Arc<dyn VideoPlayerPlugin>> {
        info!(name = plugin.name(), version = plugin.version(), "Plugin registered");
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(plugin)
    }

    pub fn remove_plugin(&self) -> Option<Arc<dyn VideoPlayerPlugin>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn selected_plugin(&self) -> Option<Arc<dyn VideoPlayerPlugin>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Default plugin over a [`PlaybackSession`]
pub struct EnginePlayerPlugin {
    session: PlaybackSession,
    config: RwLock<VideoPlayerConfig>,
}

impl EnginePlayerPlugin {
    pub const NAME: &'static str = "Engine";
    pub const VERSION: &'static str = "1.0";

    pub fn new(session: PlaybackSession) -> Self {
        Self {
            session,
            config: RwLock::new(VideoPlayerConfig::default()),
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn config(&self) -> VideoPlayerConfig {
        *self.config.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_failure(operation: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(operation, error = %e, "Plugin operation failed");
    }
}

#[async_trait]
impl VideoPlayerPlugin for EnginePlayerPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        Self::VERSION
    }

    async fn setup(&self, config: VideoPlayerConfig) {
        let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let incoming = config.playback_config;
        let playback = &mut current.playback_config;
        playback.autoplay_enabled = incoming.autoplay_enabled;
        playback.background_playback_enabled = incoming.background_playback_enabled;
        playback.fullscreen_rotation_enabled = incoming.fullscreen_rotation_enabled;
        playback.fullscreen_enabled = incoming.fullscreen_enabled;
        playback.skip_back_forward_button = incoming.skip_back_forward_button;
    }

    async fn player_view(&self, request: PlayerViewRequest, host: Arc<dyn HostSurface>) -> Result<PlayerMount> {
        let config = self.config().playback_config;

        if config.background_playback_enabled {
            let granted = if host.requires_notification_permission() {
                host.request_notification_permission().await
            } else {
                true
            };
            debug!(granted, "Notification permission resolved");
            self.session.update_permissions_state(granted).await?;
        }

        let playable = self
            .session
            .initialize(InitializeRequest {
                config,
                video_details: request.video_details,
                entry_id_to_play: request.entry_id_to_play,
                authorization_token: request.authorization_token,
                analytics_viewer_id: request.analytics_viewer_id,
                engine_options: request.engine_options,
            })
            .await?;

        let engine = self.session.engine().await.ok_or(Error::NoPlayer)?;
        host.attach_view(engine);

        Ok(PlayerMount {
            session: self.session.clone(),
            host,
            playable,
        })
    }

    async fn play(&self) {
        log_failure("play", self.session.play().await);
    }

    async fn pause(&self) {
        log_failure("pause", self.session.pause().await);
    }

    async fn play_next(&self) {
        log_failure("play_next", self.session.play_next().await);
    }

    async fn play_previous(&self) {
        log_failure("play_previous", self.session.play_previous().await);
    }

    async fn play_first(&self) {
        log_failure("play_first", self.session.play_first().await);
    }

    async fn play_last(&self) {
        log_failure("play_last", self.session.play_last().await);
    }

    async fn seek(&self, entry_id: &str) -> bool {
        match self.session.seek(entry_id).await {
            Ok(()) => true,
            Err(e) => {
                debug!(entry_id, error = %e, "Seek failed");
                false
            }
        }
    }

    async fn active_entry_id(&self) -> Option<String> {
        self.session.active_entry_id().await
    }

    async fn remove_player(&self) {
        if let Some(engine) = self.session.engine().await {
            engine.destroy();
        }
    }

    async fn clean(&self) {
        log_failure("unbind_and_stop_service", self.session.unbind_and_stop_service().await);
        log_failure("clean", self.session.clean().await);
    }

    fn events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.session.subscribe_events()
    }
}
