//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use playback_core::{
    Error, HeadlessEngine, HeadlessEngineFactory, LocalServiceHost, MetadataClient, PlaybackConfig,
    PlaybackSession, PlayerLicense, Result, ServiceConnection, ServiceHost, ServiceLink, SessionState,
    TracingNotifications, VideoDetails,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(2);

/// Metadata client with per-entry delays, injectable failures and a call log
#[derive(Default)]
pub struct FakeMetadata {
    delays: HashMap<String, Duration>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    signatures: AtomicUsize,
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, entry_id: &str, delay: Duration) -> Self {
        self.delays.insert(entry_id.to_string(), delay);
        self
    }

    pub fn fail(&self, entry_id: &str) {
        self.failing.lock().unwrap().insert(entry_id.to_string());
    }

    /// Make resolution of `entry_id` panic inside its task
    pub fn panic_on(&self, entry_id: &str) {
        self.panicking.lock().unwrap().insert(entry_id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, entry_id: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == entry_id).count()
    }
}

#[async_trait]
impl MetadataClient for FakeMetadata {
    async fn resolve(&self, entry_id: &str, _authorization_token: Option<&str>) -> Result<VideoDetails> {
        self.calls.lock().unwrap().push(entry_id.to_string());
        if let Some(delay) = self.delays.get(entry_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.panicking.lock().unwrap().contains(entry_id) {
            panic!("resolver crashed on {entry_id}");
        }
        if self.failing.lock().unwrap().contains(entry_id) {
            return Err(Error::api(404, "Entry not found", "NO_ENTITY_EXIST"));
        }
        let signature = self.signatures.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(details_signed(entry_id, signature))
    }
}

pub fn details(entry_id: &str) -> VideoDetails {
    details_signed(entry_id, 0)
}

pub fn details_signed(entry_id: &str, signature: usize) -> VideoDetails {
    VideoDetails::new(
        entry_id,
        format!("https://cdn.example.com/{entry_id}/master.m3u8?ks={signature}"),
    )
    .with_title(format!("Title {entry_id}"))
}

pub fn playlist(ids: &[&str]) -> Vec<VideoDetails> {
    ids.iter().map(|id| details(id)).collect()
}

pub fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// Service host that counts every call before delegating
pub struct CountingHost {
    pub local: LocalServiceHost,
    binds: AtomicUsize,
    unbinds: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl CountingHost {
    pub fn new() -> Self {
        Self {
            local: LocalServiceHost::new(Arc::new(TracingNotifications)),
            binds: AtomicUsize::new(0),
            unbinds: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn unbinds(&self) -> usize {
        self.unbinds.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ServiceHost for CountingHost {
    fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.local.start()
    }

    fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.local.stop()
    }

    fn is_running(&self) -> bool {
        self.local.is_running()
    }

    fn bind(&self, connection: Arc<dyn ServiceConnection>) -> Result<()> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        self.local.bind(connection)
    }

    fn unbind(&self, connection: &Arc<dyn ServiceConnection>) -> Result<()> {
        self.unbinds.fetch_add(1, Ordering::SeqCst);
        self.local.unbind(connection)
    }
}

pub struct Harness {
    pub session: PlaybackSession,
    pub metadata: Arc<FakeMetadata>,
    pub engines: Arc<HeadlessEngineFactory>,
    pub host: Arc<CountingHost>,
}

impl Harness {
    pub fn new(metadata: FakeMetadata) -> Self {
        let metadata = Arc::new(metadata);
        let engines = Arc::new(HeadlessEngineFactory::new());
        let host = Arc::new(CountingHost::new());
        let session = PlaybackSession::new(
            PlayerLicense::new("test-license"),
            metadata.clone(),
            engines.clone(),
            host.clone(),
        );
        Self {
            session,
            metadata,
            engines,
            host,
        }
    }

    pub fn engine(&self) -> Arc<HeadlessEngine> {
        self.engines.latest().expect("no engine created")
    }

    pub async fn wait_ready(&self) {
        let mut states = self.session.subscribe_state();
        tokio::time::timeout(WAIT, states.wait_for(|s| s.is_ready()))
            .await
            .expect("timed out waiting for ready")
            .expect("state channel closed");
    }

    pub async fn wait_state(&self, target: SessionState) {
        let mut states = self.session.subscribe_state();
        tokio::time::timeout(WAIT, states.wait_for(|s| *s == target))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed");
    }

    pub async fn wait_link(&self, target: ServiceLink) {
        let mut link = self.session.subscribe_service_link();
        tokio::time::timeout(WAIT, link.wait_for(|l| *l == target))
            .await
            .expect("timed out waiting for service link")
            .expect("link channel closed");
    }
}

/// Config with background playback off, so no service is involved
pub fn foreground_only() -> PlaybackConfig {
    PlaybackConfig {
        background_playback_enabled: false,
        ..Default::default()
    }
}
