//! Playback Session - owns one engine across reloads, lifecycle changes and
//! the background service hand-off
//!
//! Coordinates:
//! - Engine creation and reuse
//! - Playlist loading and entry correlation
//! - State machine transitions driven by engine events
//! - Background service binding
//! - Playlist navigation with re-resolution before every seek

use crate::{
    api::MetadataClient,
    engine::{same_engine, EngineFactory, EngineHandle},
    service::{PlaybackService, ServiceConnection, ServiceHost},
    types::*,
    Error, Result,
};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use tokio::sync::{broadcast, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const EVENT_CAPACITY: usize = 64;

/// Arguments of [`PlaybackSession::initialize`]
#[derive(Debug, Clone, Default)]
pub struct InitializeRequest {
    pub config: PlaybackConfig,
    pub video_details: Vec<VideoDetails>,
    pub entry_id_to_play: Option<String>,
    pub authorization_token: Option<String>,
    pub analytics_viewer_id: Option<String>,
    /// Engine-specific options overriding the session defaults key by key
    pub engine_options: Option<Map<String, Value>>,
}

impl InitializeRequest {
    pub fn new(config: PlaybackConfig, video_details: Vec<VideoDetails>) -> Self {
        Self {
            config,
            video_details,
            ..Default::default()
        }
    }

    pub fn entry_to_play(mut self, entry_id: impl Into<String>) -> Self {
        self.entry_id_to_play = Some(entry_id.into());
        self
    }

    pub fn authorization_token(mut self, token: impl Into<String>) -> Self {
        self.authorization_token = Some(token.into());
        self
    }

    pub fn analytics_viewer_id(mut self, viewer_id: impl Into<String>) -> Self {
        self.analytics_viewer_id = Some(viewer_id.into());
        self
    }

    pub fn engine_options(mut self, options: Map<String, Value>) -> Self {
        self.engine_options = Some(options);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Navigation {
    Next,
    Previous,
    First,
    Last,
}

struct SessionInner {
    engine: Option<EngineHandle>,
    loaded_details: Option<Vec<VideoDetails>>,
    config: PlaybackConfig,
    authorization_token: Option<String>,
    permissions_granted: bool,
    player_paused: bool,
    /// The engine was paused by a move to the background, not by the user
    lifecycle_pause: bool,
    pump: Option<JoinHandle<()>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Session side of the service binding. Never touches the session lock, so
/// hosts may deliver the connection synchronously from inside `bind`.
struct SessionConnection {
    link: watch::Sender<ServiceLink>,
    engine: StdMutex<Option<EngineHandle>>,
    service: StdMutex<Option<Arc<PlaybackService>>>,
}

impl SessionConnection {
    fn prepare(&self, engine: EngineHandle) {
        *self.engine.lock().unwrap_or_else(PoisonError::into_inner) = Some(engine);
    }

    fn release(&self) {
        self.service.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.engine.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.link.send_replace(ServiceLink::Unbound);
    }
}

impl ServiceConnection for SessionConnection {
    fn on_service_connected(&self, service: Arc<PlaybackService>) {
        let engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if engine.is_some() {
            service.set_player(engine);
        }
        *self.service.lock().unwrap_or_else(PoisonError::into_inner) = Some(service);
        self.link.send_replace(ServiceLink::Bound);
        info!("Background service connected");
    }

    fn on_service_disconnected(&self) {
        warn!("Background service disconnected");
        self.release();
    }
}

struct Shared {
    id: SessionId,
    license: PlayerLicense,
    metadata: Arc<dyn MetadataClient>,
    engine_factory: Arc<dyn EngineFactory>,
    service_host: Arc<dyn ServiceHost>,
    connection: Arc<SessionConnection>,
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<SessionState>,
    events_tx: broadcast::Sender<PlayerEvent>,
}

/// Long-lived playback session. Cloning yields another handle to the same
/// session.
#[derive(Clone)]
pub struct PlaybackSession {
    shared: Arc<Shared>,
}

impl PlaybackSession {
    pub fn new(
        license: PlayerLicense,
        metadata: Arc<dyn MetadataClient>,
        engine_factory: Arc<dyn EngineFactory>,
        service_host: Arc<dyn ServiceHost>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Uninitialized);
        let (link, _) = watch::channel(ServiceLink::Unbound);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                id: SessionId::new(),
                license,
                metadata,
                engine_factory,
                service_host,
                connection: Arc::new(SessionConnection {
                    link,
                    engine: StdMutex::new(None),
                    service: StdMutex::new(None),
                }),
                inner: Mutex::new(SessionInner {
                    engine: None,
                    loaded_details: None,
                    config: PlaybackConfig::default(),
                    authorization_token: None,
                    permissions_granted: false,
                    player_paused: false,
                    lifecycle_pause: false,
                    pump: None,
                }),
                state_tx,
                events_tx,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn service_link(&self) -> ServiceLink {
        *self.shared.connection.link.borrow()
    }

    pub fn subscribe_service_link(&self) -> watch::Receiver<ServiceLink> {
        self.shared.connection.link.subscribe()
    }

    /// Subscribe to raw engine events, rebroadcast after the session applied them
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.shared.events_tx.subscribe()
    }

    /// The engine reported Ready for the loaded playlist
    pub fn is_player_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub async fn is_player_paused(&self) -> bool {
        self.shared.inner.lock().await.player_paused
    }

    pub async fn engine(&self) -> Option<EngineHandle> {
        self.shared.inner.lock().await.engine.clone()
    }

    pub async fn config(&self) -> PlaybackConfig {
        self.shared.inner.lock().await.config
    }

    /// The service instance currently bound, if any
    pub fn bound_service(&self) -> Option<Arc<PlaybackService>> {
        self.shared
            .connection
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn lock_alive(&self) -> Result<MutexGuard<'_, SessionInner>> {
        let inner = self.shared.inner.lock().await;
        if self.state() == SessionState::Destroyed {
            return Err(Error::SessionDestroyed);
        }
        Ok(inner)
    }

    /// Transition to a new state. Callers hold the session lock.
    fn set_state(&self, target: SessionState) -> Result<()> {
        let current = self.state();
        if current == target {
            return Ok(());
        }
        if !current.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: target.to_string(),
            });
        }
        self.shared.state_tx.send_replace(target);
        info!(session_id = %self.shared.id, from = %current, to = %target, "State transition");
        Ok(())
    }

    /// Load a playlist, creating the engine on first use.
    ///
    /// Returns the number of playable sources in the engine playlist. Items
    /// without a usable URL are dropped, so `Ok(0)` means nothing could be
    /// loaded.
    #[instrument(skip(self, request), fields(session_id = %self.shared.id, items = request.video_details.len()))]
    pub async fn initialize(&self, request: InitializeRequest) -> Result<usize> {
        if request.video_details.is_empty() {
            return Err(Error::EmptyPlaylist);
        }

        let mut inner = self.lock_alive().await?;
        inner.config = request.config;
        inner.authorization_token = request.authorization_token.clone();

        let engine = match inner.engine.clone() {
            Some(engine) if !engine.is_destroyed() => engine,
            existing => {
                if existing.is_some() {
                    warn!("Engine was destroyed externally, creating a new one");
                }
                let config = EngineConfig::merged(
                    &self.shared.license,
                    request.config.engine_defaults(),
                    request.engine_options.as_ref(),
                    request.analytics_viewer_id.as_deref(),
                );
                let engine = self.shared.engine_factory.create(&config)?;
                info!(analytics = ?config.analytics, "Engine created");
                inner.engine = Some(Arc::clone(&engine));
                inner.loaded_details = None;
                engine
            }
        };

        self.unbind_service();

        let reload = inner
            .loaded_details
            .as_deref()
            .map_or(true, |loaded| loaded != request.video_details.as_slice());

        let playable = if reload {
            let sources: Vec<PlaylistSource> = request
                .video_details
                .iter()
                .filter_map(|details| {
                    let source = PlaylistSource::from_details(details, request.authorization_token.as_deref());
                    if source.is_none() {
                        warn!(entry_id = %details.id, "Dropping entry without a playable URL");
                    }
                    source
                })
                .collect();

            if sources.is_empty() {
                warn!("No playable entries in playlist");
                return Ok(0);
            }

            let count = sources.len();
            self.set_state(SessionState::Loading)?;
            inner.player_paused = false;
            inner.lifecycle_pause = false;

            if let Some(previous) = inner.pump.take() {
                previous.abort();
            }
            inner.pump = Some(self.spawn_event_pump(engine.subscribe()));

            engine.load(PlaylistConfig {
                sources,
                options: PlaylistOptions {
                    preload_all_sources: false,
                },
            })?;
            inner.loaded_details = Some(request.video_details.clone());
            info!(sources = count, "Playlist loaded");

            if let Some(entry_id) = request.entry_id_to_play.as_deref() {
                match engine.sources().iter().position(|s| s.entry_id() == Some(entry_id)) {
                    Some(index) => engine.seek_source(index, 0.0)?,
                    None => debug!(entry_id, "Entry to play not in playlist, starting at first"),
                }
            }
            count
        } else {
            debug!("Playlist unchanged, keeping current playback");
            engine.sources().len()
        };

        if inner.config.autoplay_enabled && !inner.player_paused {
            engine.play();
        }

        self.update_background_service(&inner);

        Ok(playable)
    }

    /// Record the notification permission and retry the service hand-off
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn update_permissions_state(&self, granted: bool) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        inner.permissions_granted = granted;
        self.update_background_service(&inner);
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn handle_app_in_background(&self) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        if inner.config.background_playback_enabled && self.is_player_ready() {
            return self.bind_service(&inner);
        }
        if let Some(engine) = inner.engine.clone() {
            if engine.is_playing() {
                inner.lifecycle_pause = true;
                engine.pause();
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn handle_app_in_foreground(&self) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        if inner.config.background_playback_enabled && self.is_player_ready() {
            self.unbind_service();
        } else if inner.config.autoplay_enabled && !inner.player_paused {
            if let Some(engine) = &inner.engine {
                engine.play();
            }
        }
        inner.lifecycle_pause = false;
        Ok(())
    }

    /// Tear down the service for good, used when the surface is disposed
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn unbind_and_stop_service(&self) -> Result<()> {
        let _inner = self.lock_alive().await?;
        self.unbind_service();
        match self.shared.service_host.stop() {
            Ok(()) | Err(Error::ServiceNotBound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn play(&self) -> Result<()> {
        let inner = self.lock_alive().await?;
        if let Some(engine) = inner.engine.as_ref().filter(|_| self.is_player_ready()) {
            engine.play();
        }
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let inner = self.lock_alive().await?;
        if let Some(engine) = inner.engine.as_ref().filter(|_| self.is_player_ready()) {
            engine.pause();
        }
        Ok(())
    }

    /// Move to the next source. No-op at the end of the playlist.
    pub async fn play_next(&self) -> Result<()> {
        self.navigate(Navigation::Next).await
    }

    /// Move to the previous source. No-op at the start of the playlist.
    pub async fn play_previous(&self) -> Result<()> {
        self.navigate(Navigation::Previous).await
    }

    pub async fn play_first(&self) -> Result<()> {
        self.navigate(Navigation::First).await
    }

    pub async fn play_last(&self) -> Result<()> {
        self.navigate(Navigation::Last).await
    }

    /// Re-resolve `entry_id`, swap its source for the fresh one and play it
    /// from the start.
    ///
    /// Fails with [`Error::EntryNotFound`] when no source carries the entry
    /// id. On any failure the engine playlist is left unchanged.
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn seek(&self, entry_id: &str) -> Result<()> {
        let (engine, index) = {
            let inner = self.lock_alive().await?;
            let engine = inner.engine.clone().ok_or(Error::NoPlayer)?;
            let index = find_entry(&engine, entry_id)?;
            (engine, index)
        };
        self.refresh_and_seek(engine, index).await
    }

    /// Entry id of the active source
    pub async fn active_entry_id(&self) -> Option<String> {
        let inner = self.shared.inner.lock().await;
        inner
            .engine
            .as_ref()?
            .active_source()?
            .entry_id()
            .map(str::to_string)
    }

    /// Pause and forget the loaded playlist; the next `initialize` reloads
    pub async fn clean(&self) -> Result<()> {
        let mut inner = self.lock_alive().await?;
        if let Some(engine) = inner.engine.as_ref().filter(|_| self.is_player_ready()) {
            engine.pause();
        }
        inner.loaded_details = None;
        debug!(session_id = %self.shared.id, "Session cleaned");
        Ok(())
    }

    /// Terminal teardown: destroys the engine. Later operations fail with
    /// [`Error::SessionDestroyed`].
    #[instrument(skip(self), fields(session_id = %self.shared.id))]
    pub async fn destroy(&self) {
        let mut inner = self.shared.inner.lock().await;
        if self.state() == SessionState::Destroyed {
            return;
        }
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        self.unbind_service();
        if let Some(engine) = inner.engine.take() {
            engine.destroy();
        }
        inner.loaded_details = None;
        self.shared.state_tx.send_replace(SessionState::Destroyed);
        info!("Session destroyed");
    }

    async fn navigate(&self, navigation: Navigation) -> Result<()> {
        let (engine, index) = {
            let inner = self.lock_alive().await?;
            let engine = inner.engine.clone().ok_or(Error::NoPlayer)?;
            let len = engine.sources().len();
            let active = engine.active_index();

            let target = match navigation {
                Navigation::Next => active.map(|i| i + 1).filter(|&i| i < len),
                Navigation::Previous => active.and_then(|i| i.checked_sub(1)),
                Navigation::First => (len > 0).then_some(0),
                Navigation::Last => len.checked_sub(1),
            };
            let Some(index) = target else {
                debug!(?navigation, ?active, len, "Navigation at playlist boundary");
                return Ok(());
            };
            (engine, index)
        };
        self.refresh_and_seek(engine, index).await
    }

    /// Re-resolve the source at `index`, replace it in place and seek to it.
    /// The session lock is released while the metadata call is in flight.
    async fn refresh_and_seek(&self, engine: EngineHandle, index: usize) -> Result<()> {
        let stale = engine
            .sources()
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::Engine(format!("no source at index {index}")))?;

        let Some(entry_id) = stale.entry_id().map(str::to_string) else {
            debug!(index, "Source has no entry id, seeking without refresh");
            let _inner = self.lock_alive().await?;
            return engine.seek_source(index, 0.0);
        };

        let token = match stale.authorization_token() {
            Some(token) => Some(token.to_string()),
            None => self.shared.inner.lock().await.authorization_token.clone(),
        };

        let details = self.shared.metadata.resolve(&entry_id, token.as_deref()).await?;
        let fresh = PlaylistSource::from_details(&details, token.as_deref()).ok_or_else(|| {
            Error::MalformedResponse(format!("entry {entry_id} resolved without a playable URL"))
        })?;

        let inner = self.lock_alive().await?;
        let current = inner.engine.as_ref().ok_or(Error::NoPlayer)?;
        if !same_engine(current, &engine) {
            return Err(Error::Engine("engine replaced during navigation".into()));
        }
        // The playlist may have changed while resolving.
        let index = find_entry(&engine, &entry_id)?;

        let removed = engine.remove_source(index)?;
        if let Err(e) = engine.insert_source(fresh, index) {
            warn!(entry_id = %entry_id, error = %e, "Source swap failed, restoring previous source");
            engine.insert_source(removed, index)?;
            return Err(e);
        }
        engine.seek_source(index, 0.0)?;
        info!(entry_id = %entry_id, index, "Seeked to refreshed source");
        Ok(())
    }

    /// Bind when background playback is enabled, the permission is granted
    /// and the engine is ready.
    fn update_background_service(&self, inner: &SessionInner) {
        if !inner.config.background_playback_enabled {
            return;
        }
        if !inner.permissions_granted {
            debug!("Notification permission not granted, service start deferred");
            return;
        }
        if let Err(e) = self.bind_service(inner) {
            warn!(error = %e, "Background service bind failed");
        }
    }

    fn bind_service(&self, inner: &SessionInner) -> Result<()> {
        if !self.is_player_ready() {
            return Ok(());
        }
        let connection = &self.shared.connection;
        if connection.link.borrow().is_linked() {
            debug!("Background service already bound");
            return Ok(());
        }
        let Some(engine) = inner.engine.clone() else {
            return Ok(());
        };

        connection.prepare(engine);
        connection.link.send_replace(ServiceLink::Binding);

        if let Err(e) = self.start_and_bind() {
            connection.release();
            return Err(e);
        }
        info!(session_id = %self.shared.id, "Background service bind requested");
        Ok(())
    }

    /// A running service is stopped first so only one instance ever holds
    /// the notification.
    fn start_and_bind(&self) -> Result<()> {
        let host = &self.shared.service_host;
        if host.is_running() {
            debug!("Restarting running background service");
            host.stop()?;
        }
        host.bind(Arc::clone(&self.shared.connection) as Arc<dyn ServiceConnection>)?;
        host.start()
    }

    fn unbind_service(&self) {
        let connection = &self.shared.connection;
        if !connection.link.borrow().is_linked() {
            return;
        }
        let handle: Arc<dyn ServiceConnection> = Arc::clone(connection) as Arc<dyn ServiceConnection>;
        match self.shared.service_host.unbind(&handle) {
            Ok(()) => info!(session_id = %self.shared.id, "Background service unbound"),
            Err(Error::ServiceNotBound) => debug!("Service binding already gone"),
            Err(e) => warn!(error = %e, "Background service unbind failed"),
        }
        connection.release();
    }

    fn spawn_event_pump(&self, mut events: broadcast::Receiver<PlayerEvent>) -> JoinHandle<()> {
        let session: Weak<Shared> = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(shared) = session.upgrade() else { break };
                        PlaybackSession { shared }.apply_engine_event(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Engine event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn apply_engine_event(&self, event: PlayerEvent) {
        {
            let mut inner = self.shared.inner.lock().await;
            let state = self.state();
            if state == SessionState::Destroyed {
                return;
            }

            let result = match &event {
                PlayerEvent::Ready => {
                    let result = if state == SessionState::Loading {
                        self.set_state(SessionState::Ready)
                    } else {
                        Ok(())
                    };
                    self.update_background_service(&inner);
                    result
                }
                PlayerEvent::Play => {
                    inner.player_paused = false;
                    inner.lifecycle_pause = false;
                    if state.is_ready() {
                        self.set_state(SessionState::Playing)
                    } else {
                        Ok(())
                    }
                }
                PlayerEvent::Paused => {
                    if !inner.lifecycle_pause {
                        inner.player_paused = true;
                    }
                    if state.is_ready() {
                        self.set_state(SessionState::Paused)
                    } else {
                        Ok(())
                    }
                }
                PlayerEvent::Error { message } => {
                    warn!(session_id = %self.shared.id, message = %message, "Engine reported error");
                    if state == SessionState::Loading {
                        self.set_state(SessionState::Error)
                    } else {
                        Ok(())
                    }
                }
                PlayerEvent::PlaylistTransition { from, to } => {
                    debug!(?from, ?to, "Playlist transition");
                    Ok(())
                }
                PlayerEvent::PlaybackFinished => {
                    debug!("Playlist finished");
                    Ok(())
                }
            };

            if let Err(e) = result {
                warn!(error = %e, ?event, "Engine event ignored");
            }
        }

        // No subscribers is fine.
        let _ = self.shared.events_tx.send(event);
    }
}

fn find_entry(engine: &EngineHandle, entry_id: &str) -> Result<usize> {
    engine
        .sources()
        .iter()
        .position(|s| s.entry_id() == Some(entry_id))
        .ok_or_else(|| Error::EntryNotFound {
            entry_id: entry_id.to_string(),
        })
}
