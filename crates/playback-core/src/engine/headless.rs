//! Headless engine
//!
//! Keeps playlist, active-source and play/pause bookkeeping in memory and
//! emits the same events a rendering engine would. Used for CLI sessions and
//! for exercising the session without a platform player.

use super::{EngineFactory, EngineHandle, PlayerEngine};
use crate::types::{EngineConfig, PlayerEvent, PlaylistConfig, PlaylistOptions, PlaylistSource};
use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct HeadlessState {
    sources: Vec<PlaylistSource>,
    options: PlaylistOptions,
    active: Option<usize>,
    position: f64,
    playing: bool,
    paused: bool,
    loads: usize,
    destroyed: bool,
}

/// In-memory [`PlayerEngine`]
#[derive(Debug)]
pub struct HeadlessEngine {
    config: EngineConfig,
    state: Mutex<HeadlessState>,
    events: broadcast::Sender<PlayerEvent>,
}

impl HeadlessEngine {
    pub fn new(config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            state: Mutex::new(HeadlessState::default()),
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of `load` calls accepted so far
    pub fn load_count(&self) -> usize {
        self.lock().loads
    }

    /// Options of the last loaded playlist
    pub fn playlist_options(&self) -> PlaylistOptions {
        self.lock().options
    }

    /// Playback position within the active source, in seconds
    pub fn position(&self) -> f64 {
        self.lock().position
    }

    /// Report a playback failure on the active source
    pub fn report_error(&self, message: impl Into<String>) {
        self.emit(PlayerEvent::Error { message: message.into() });
    }

    /// Finish the active source, advancing to the next one if present
    pub fn finish_active(&self) {
        let event = {
            let mut state = self.lock();
            let Some(active) = state.active else { return };
            if active + 1 < state.sources.len() {
                let from = entry_at(&state.sources, active);
                state.active = Some(active + 1);
                state.position = 0.0;
                PlayerEvent::PlaylistTransition {
                    from,
                    to: entry_at(&state.sources, active + 1),
                }
            } else {
                state.playing = false;
                PlayerEvent::PlaybackFinished
            }
        };
        self.emit(event);
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlayerEvent) {
        // No receivers is fine: nobody is observing yet.
        let _ = self.events.send(event);
    }
}

fn entry_at(sources: &[PlaylistSource], index: usize) -> Option<String> {
    sources.get(index).and_then(|s| s.entry_id()).map(str::to_string)
}

impl PlayerEngine for HeadlessEngine {
    fn load(&self, playlist: PlaylistConfig) -> Result<()> {
        let ready = {
            let mut state = self.lock();
            if state.destroyed {
                return Err(Error::Engine("load on destroyed engine".into()));
            }
            state.active = if playlist.sources.is_empty() { None } else { Some(0) };
            state.sources = playlist.sources;
            state.options = playlist.options;
            state.position = 0.0;
            state.playing = false;
            state.paused = false;
            state.loads += 1;
            info!(sources = state.sources.len(), loads = state.loads, "Headless playlist loaded");
            state.active.is_some()
        };
        if ready {
            self.emit(PlayerEvent::Ready);
        }
        Ok(())
    }

    fn play(&self) {
        {
            let mut state = self.lock();
            if state.destroyed || state.active.is_none() || state.playing {
                return;
            }
            state.playing = true;
            state.paused = false;
        }
        self.emit(PlayerEvent::Play);
    }

    fn pause(&self) {
        {
            let mut state = self.lock();
            if state.destroyed || !state.playing {
                return;
            }
            state.playing = false;
            state.paused = true;
        }
        self.emit(PlayerEvent::Paused);
    }

    fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn sources(&self) -> Vec<PlaylistSource> {
        self.lock().sources.clone()
    }

    fn active_index(&self) -> Option<usize> {
        self.lock().active
    }

    fn remove_source(&self, index: usize) -> Result<PlaylistSource> {
        let mut state = self.lock();
        if index >= state.sources.len() {
            return Err(Error::Engine(format!("remove: index {index} out of bounds")));
        }
        let removed = state.sources.remove(index);
        state.active = match state.active {
            Some(active) if active == index => None,
            Some(active) if active > index => Some(active - 1),
            other => other,
        };
        Ok(removed)
    }

    fn insert_source(&self, source: PlaylistSource, index: usize) -> Result<()> {
        let mut state = self.lock();
        if state.destroyed {
            return Err(Error::Engine("insert on destroyed engine".into()));
        }
        if index > state.sources.len() {
            return Err(Error::Engine(format!("insert: index {index} out of bounds")));
        }
        state.sources.insert(index, source);
        if let Some(active) = state.active {
            if active >= index {
                state.active = Some(active + 1);
            }
        }
        Ok(())
    }

    fn seek_source(&self, index: usize, position: f64) -> Result<()> {
        let transition = {
            let mut state = self.lock();
            if index >= state.sources.len() {
                return Err(Error::Engine(format!("seek: index {index} out of bounds")));
            }
            let previous = state.active;
            state.active = Some(index);
            state.position = position.max(0.0);
            debug!(index, position, "Headless seek");
            (previous != Some(index)).then(|| PlayerEvent::PlaylistTransition {
                from: previous.and_then(|p| entry_at(&state.sources, p)),
                to: entry_at(&state.sources, index),
            })
        };
        if let Some(event) = transition {
            self.emit(event);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    fn destroy(&self) {
        let mut state = self.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.sources.clear();
        state.active = None;
        state.playing = false;
        info!("Headless engine destroyed");
    }

    fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }
}

/// Factory producing [`HeadlessEngine`]s and remembering what it built
#[derive(Debug, Default)]
pub struct HeadlessEngineFactory {
    created: Mutex<Vec<Arc<HeadlessEngine>>>,
}

impl HeadlessEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of engines built so far
    pub fn created(&self) -> usize {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Most recently built engine
    pub fn latest(&self) -> Option<Arc<HeadlessEngine>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl EngineFactory for HeadlessEngineFactory {
    fn create(&self, config: &EngineConfig) -> Result<EngineHandle> {
        let engine = Arc::new(HeadlessEngine::new(config.clone()));
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&engine));
        Ok(engine)
    }
}
