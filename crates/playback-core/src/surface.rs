//! UI Surface: resolves entries, then mounts the selected plugin's player
//!
//! The surface reports `Loading` until resolution settles, then either
//! `Mounted` or `Failed`. Error presentation is left to the host.

use crate::{
    api::{resolve_all, EntryFailure, MetadataClient},
    plugin::{HostSurface, PlayerMount, PlayerViewRequest, PluginRegistry},
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// What the surface currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceState {
    Loading,
    Mounted,
    Failed { message: String },
}

/// Outcome of [`PlaybackSurface::load_playlist`]
pub struct PlaylistLoad {
    /// `None` when no entry resolved
    pub mount: Option<PlayerMount>,
    /// Entries that failed to resolve, in request order
    pub failures: Vec<EntryFailure>,
}

/// Player surface for a single entry or a playlist
pub struct PlaybackSurface {
    metadata: Arc<dyn MetadataClient>,
    registry: PluginRegistry,
    host: Arc<dyn HostSurface>,
    state_tx: watch::Sender<SurfaceState>,
}

impl PlaybackSurface {
    pub fn new(metadata: Arc<dyn MetadataClient>, registry: PluginRegistry, host: Arc<dyn HostSurface>) -> Self {
        let (state_tx, _) = watch::channel(SurfaceState::Loading);
        Self {
            metadata,
            registry,
            host,
            state_tx,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SurfaceState> {
        self.state_tx.subscribe()
    }

    fn fail(&self, error: &Error) {
        self.state_tx.send_replace(SurfaceState::Failed {
            message: error.to_string(),
        });
    }

    async fn clean_selected(&self) {
        if let Some(plugin) = self.registry.selected_plugin() {
            plugin.clean().await;
        }
    }

    async fn mount(&self, request: PlayerViewRequest) -> Result<PlayerMount> {
        let result = match self.registry.selected_plugin() {
            Some(plugin) => plugin.player_view(request, Arc::clone(&self.host)).await,
            None => Err(Error::NoPluginSelected),
        };
        match &result {
            Ok(mount) => {
                info!(playable = mount.playable(), "Player mounted");
                self.state_tx.send_replace(SurfaceState::Mounted);
            }
            Err(e) => self.fail(e),
        }
        result
    }

    /// Resolve one entry and mount it.
    ///
    /// On resolution failure the selected plugin is cleaned and the error is
    /// returned to the host.
    #[instrument(skip(self, authorization_token))]
    pub async fn load_player(
        &self,
        entry_id: &str,
        authorization_token: Option<&str>,
        analytics_viewer_id: Option<&str>,
    ) -> Result<PlayerMount> {
        self.state_tx.send_replace(SurfaceState::Loading);

        let details = match self.metadata.resolve(entry_id, authorization_token).await {
            Ok(details) => details,
            Err(e) => {
                warn!(entry_id, error = %e, "Entry resolution failed");
                self.clean_selected().await;
                self.fail(&e);
                return Err(e);
            }
        };

        self.mount(PlayerViewRequest {
            video_details: vec![details],
            entry_id_to_play: Some(entry_id.to_string()),
            authorization_token: authorization_token.map(str::to_string),
            analytics_viewer_id: analytics_viewer_id.map(str::to_string),
            engine_options: None,
        })
        .await
    }

    /// Resolve every entry and mount the ones that resolved.
    ///
    /// Partial failures come back next to the mount. When nothing resolves
    /// the plugin is cleaned and no mount is produced.
    #[instrument(skip(self, authorization_token), fields(entries = entry_ids.len()))]
    pub async fn load_playlist(
        &self,
        entry_ids: &[String],
        entry_id_to_play: Option<&str>,
        authorization_token: Option<&str>,
        analytics_viewer_id: Option<&str>,
    ) -> Result<PlaylistLoad> {
        self.state_tx.send_replace(SurfaceState::Loading);

        let batch = resolve_all(Arc::clone(&self.metadata), entry_ids, authorization_token).await;
        if batch.successes.is_empty() {
            warn!(failed = batch.failures.len(), "No entry in the playlist resolved");
            self.clean_selected().await;
            let error = batch
                .failures
                .first()
                .map(|f| f.error.to_string())
                .unwrap_or_else(|| Error::EmptyPlaylist.to_string());
            self.state_tx.send_replace(SurfaceState::Failed { message: error });
            return Ok(PlaylistLoad {
                mount: None,
                failures: batch.failures,
            });
        }

        let mount = self
            .mount(PlayerViewRequest {
                video_details: batch.successes,
                entry_id_to_play: entry_id_to_play.map(str::to_string),
                authorization_token: authorization_token.map(str::to_string),
                analytics_viewer_id: analytics_viewer_id.map(str::to_string),
                engine_options: None,
            })
            .await?;

        Ok(PlaylistLoad {
            mount: Some(mount),
            failures: batch.failures,
        })
    }
}
