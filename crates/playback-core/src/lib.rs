//! Playback Core - Playback SDK for StreamAMG
//!
//! This crate provides the core functionality of the playback SDK:
//! - Entry resolution against the playback metadata service
//! - Playlist sessions that own one player engine across reloads
//! - Background playback hand-off to a long-running service
//! - Playlist navigation with fresh signed URLs on every seek
//! - Swappable player plugins and the surface that mounts them
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Playback Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Playback   │──│    Plugin    │──│   Metadata   │           │
//! │  │   Surface    │  │   Registry   │  │    Client    │           │
//! │  └──────┬───────┘  └──────────────┘  └──────┬───────┘           │
//! │         │                                   │                   │
//! │         └─────────────────┬─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │                              │
//! │                    │   Session   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │    Player    │  │   Engine    │  │  Background  │            │
//! │  │    Engine    │──│   Events    │  │   Service    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod engine;
pub mod error;
pub mod plugin;
pub mod sdk;
pub mod service;
pub mod session;
pub mod surface;
pub mod types;

pub use api::{resolve_all, BatchResolution, EntryFailure, MetadataClient, PlaybackApiClient};
pub use engine::{EngineFactory, EngineHandle, HeadlessEngine, HeadlessEngineFactory, PlayerEngine};
pub use error::{Error, PlaybackErrorReason, ReasonClass, Result};
pub use plugin::{
    EnginePlayerPlugin, HeadlessHost, HostKind, HostSurface, LifecycleEvent, PlayerMount, PlayerViewRequest,
    PluginRegistry, VideoPlayerPlugin,
};
pub use sdk::{PlaybackSdk, SdkConfig};
pub use service::{
    CustomAction, LocalServiceHost, NotificationManager, PlaybackService, ServiceCommand, ServiceConnection,
    ServiceHost, TracingNotifications,
};
pub use session::{InitializeRequest, PlaybackSession};
pub use surface::{PlaybackSurface, PlaylistLoad, SurfaceState};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Playback Core initialized");
}
