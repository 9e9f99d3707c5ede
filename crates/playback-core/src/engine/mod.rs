//! Player engine seam
//!
//! The session orchestrates an engine's lifecycle but never its decode or
//! render pipeline. Engines are shared as [`EngineHandle`]s: the session owns
//! the handle, the background service only borrows a clone for attachment.

mod headless;

pub use headless::{HeadlessEngine, HeadlessEngineFactory};

use crate::types::{EngineConfig, PlayerEvent, PlaylistConfig, PlaylistSource};
use crate::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared handle to a live engine
pub type EngineHandle = Arc<dyn PlayerEngine>;

/// Trait for third-party player engines
pub trait PlayerEngine: Send + Sync {
    /// Replace the engine playlist and start preparing the first source
    fn load(&self, playlist: PlaylistConfig) -> Result<()>;

    fn play(&self);

    fn pause(&self);

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Snapshot of the engine's live source list
    fn sources(&self) -> Vec<PlaylistSource>;

    /// Index of the single active source, if any
    fn active_index(&self) -> Option<usize>;

    fn remove_source(&self, index: usize) -> Result<PlaylistSource>;

    fn insert_source(&self, source: PlaylistSource, index: usize) -> Result<()>;

    /// Make the source at `index` active and move to `position` seconds
    fn seek_source(&self, index: usize, position: f64) -> Result<()>;

    /// Subscribe to raw engine events
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;

    /// Release all engine resources. The engine is unusable afterwards.
    fn destroy(&self);

    fn is_destroyed(&self) -> bool;

    /// The active source, derived from [`PlayerEngine::active_index`]
    fn active_source(&self) -> Option<PlaylistSource> {
        let index = self.active_index()?;
        self.sources().into_iter().nth(index)
    }
}

/// Trait for constructing engines
pub trait EngineFactory: Send + Sync {
    fn create(&self, config: &EngineConfig) -> Result<EngineHandle>;
}

/// Identity comparison for engine handles
pub fn same_engine(a: &EngineHandle, b: &EngineHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
