//! Background playback service
//!
//! Hosts the engine in a long-running context so playback survives UI
//! teardown, and drives a system notification with transport controls.
//!
//! # Hand-off protocol
//!
//! ```text
//!  PlaybackSession                 ServiceHost                PlaybackService
//!        │  bind(connection)            │                            │
//!        │─────────────────────────────>│  on_bind()  (bound += 1)   │
//!        │                              │───────────────────────────>│
//!        │  on_service_connected(svc)   │                            │
//!        │<─────────────────────────────│                            │
//!        │  svc.set_player(engine)      │                            │
//!        │──────────────────────────────────────────────────────────>│
//!        │  unbind(connection)          │  on_unbind() (bound -= 1)  │
//!        │─────────────────────────────>│───────────────────────────>│
//!        │                              │  StopSelf if bound == 0    │
//!        │                              │  and engine not playing    │
//! ```
//!
//! The session keeps owning the engine throughout; the service only holds a
//! clone of the handle while it is attached.

use crate::engine::{same_engine, EngineHandle};
use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Notification channel used for transport controls
pub const NOTIFICATION_CHANNEL_ID: &str = "com.streamamg.playback";
/// Notification id of the transport-controls notification
pub const NOTIFICATION_ID: u32 = 1;

/// System notification with transport controls
pub trait NotificationManager: Send + Sync {
    /// Attach to an engine, or detach with `None`
    fn set_player(&self, player: Option<EngineHandle>);
}

/// Notification manager that only records attachments in the log
#[derive(Debug, Default)]
pub struct TracingNotifications;

impl NotificationManager for TracingNotifications {
    fn set_player(&self, player: Option<EngineHandle>) {
        match player {
            Some(player) => info!(
                channel = NOTIFICATION_CHANNEL_ID,
                id = NOTIFICATION_ID,
                playing = player.is_playing(),
                "Notification attached to player"
            ),
            None => info!(channel = NOTIFICATION_CHANNEL_ID, "Notification detached"),
        }
    }
}

/// What the service asks its host to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    Continue,
    StopSelf,
}

/// Custom notification actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomAction {
    Stop,
}

#[derive(Default)]
struct ServiceState {
    bound: usize,
    player: Option<EngineHandle>,
    started: bool,
    foreground: bool,
    destroyed: bool,
}

/// The background playback service
pub struct PlaybackService {
    notifications: Arc<dyn NotificationManager>,
    state: Mutex<ServiceState>,
}

impl PlaybackService {
    pub fn new(notifications: Arc<dyn NotificationManager>) -> Self {
        Self {
            notifications,
            state: Mutex::new(ServiceState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The service was explicitly started
    pub fn on_start_command(&self) {
        self.lock().started = true;
        debug!("Playback service started");
    }

    fn on_stop_requested(&self) {
        self.lock().started = false;
    }

    pub fn on_bind(&self) {
        let mut state = self.lock();
        state.bound += 1;
        debug!(bound = state.bound, "Client bound to playback service");
    }

    /// A client unbound. The service stops itself once nobody is bound and
    /// the attached engine is not playing.
    pub fn on_unbind(&self) -> ServiceCommand {
        let mut state = self.lock();
        state.bound = state.bound.saturating_sub(1);
        debug!(bound = state.bound, "Client unbound from playback service");

        let idle = state.player.as_ref().is_some_and(|p| !p.is_playing());
        if state.bound == 0 && idle {
            ServiceCommand::StopSelf
        } else {
            ServiceCommand::Continue
        }
    }

    /// Attach the notification manager to `player`, detaching any other
    /// engine first.
    pub fn set_player(&self, player: Option<EngineHandle>) {
        let detach = {
            let mut state = self.lock();
            let unchanged = match (&state.player, &player) {
                (Some(current), Some(next)) => same_engine(current, next),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            let had_player = state.player.is_some();
            state.player = player.clone();
            had_player
        };

        if detach {
            self.notifications.set_player(None);
        }
        if player.is_some() {
            self.notifications.set_player(player);
        }
    }

    pub fn player(&self) -> Option<EngineHandle> {
        self.lock().player.clone()
    }

    /// Number of clients currently bound
    pub fn bound_clients(&self) -> usize {
        self.lock().bound
    }

    pub fn is_started(&self) -> bool {
        let state = self.lock();
        state.started && !state.destroyed
    }

    pub fn is_foreground(&self) -> bool {
        self.lock().foreground
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Actions to show on the notification
    pub fn custom_actions(&self) -> Vec<CustomAction> {
        let state = self.lock();
        let playing = state.player.as_ref().is_some_and(|p| p.is_playing());
        if !playing && state.bound == 0 {
            vec![CustomAction::Stop]
        } else {
            Vec::new()
        }
    }

    pub fn on_custom_action(&self, action: CustomAction) -> ServiceCommand {
        match action {
            CustomAction::Stop => ServiceCommand::StopSelf,
        }
    }

    /// The notification was posted; the service now runs in the foreground
    pub fn on_notification_started(&self) {
        self.lock().foreground = true;
    }

    pub fn on_notification_cancelled(&self) -> ServiceCommand {
        self.lock().foreground = false;
        ServiceCommand::StopSelf
    }

    /// Teardown: detach the notification and release the service's engine
    /// handle. The engine is destroyed here only when nobody else holds it.
    pub fn on_destroy(&self) {
        let player = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.started = false;
            state.foreground = false;
            state.player.take()
        };

        self.notifications.set_player(None);

        if let Some(player) = player {
            if Arc::strong_count(&player) == 1 {
                info!("Service held the last engine handle, destroying engine");
                player.destroy();
            }
        }
        info!("Playback service destroyed");
    }
}

/// Client side of a service binding
pub trait ServiceConnection: Send + Sync {
    fn on_service_connected(&self, service: Arc<PlaybackService>);

    /// The service went away without the client unbinding
    fn on_service_disconnected(&self);
}

/// Host-platform capability for managing the background service
pub trait ServiceHost: Send + Sync {
    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// The service has been started and not yet destroyed
    fn is_running(&self) -> bool;

    /// Request a binding. The connection may be notified synchronously or later.
    fn bind(&self, connection: Arc<dyn ServiceConnection>) -> Result<()>;

    /// Fails with [`Error::ServiceNotBound`] when `connection` holds no binding
    fn unbind(&self, connection: &Arc<dyn ServiceConnection>) -> Result<()>;
}

#[derive(Default)]
struct HostState {
    service: Option<Arc<PlaybackService>>,
    connections: Vec<Arc<dyn ServiceConnection>>,
}

/// In-process [`ServiceHost`] that runs the service on the caller's side
pub struct LocalServiceHost {
    notifications: Arc<dyn NotificationManager>,
    state: Mutex<HostState>,
}

impl LocalServiceHost {
    pub fn new(notifications: Arc<dyn NotificationManager>) -> Self {
        Self {
            notifications,
            state: Mutex::new(HostState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live service instance, if one exists
    pub fn service(&self) -> Option<Arc<PlaybackService>> {
        self.lock().service.clone()
    }

    /// Clients currently bound to the live service
    pub fn bound_clients(&self) -> usize {
        self.service().map(|s| s.bound_clients()).unwrap_or(0)
    }

    fn ensure_service(state: &mut HostState, notifications: &Arc<dyn NotificationManager>) -> Arc<PlaybackService> {
        state
            .service
            .get_or_insert_with(|| {
                debug!("Creating playback service");
                Arc::new(PlaybackService::new(Arc::clone(notifications)))
            })
            .clone()
    }

    /// Apply a command returned by the service
    pub fn apply(&self, command: ServiceCommand) {
        if command == ServiceCommand::StopSelf {
            self.destroy_service();
        }
    }

    fn destroy_service(&self) {
        let (service, orphaned) = {
            let mut state = self.lock();
            (state.service.take(), std::mem::take(&mut state.connections))
        };
        if let Some(service) = service {
            service.on_destroy();
        }
        for connection in orphaned {
            connection.on_service_disconnected();
        }
    }
}

impl ServiceHost for LocalServiceHost {
    fn start(&self) -> Result<()> {
        let service = {
            let mut state = self.lock();
            Self::ensure_service(&mut state, &self.notifications)
        };
        service.on_start_command();
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let idle = {
            let state = self.lock();
            if state.service.is_none() {
                return Ok(());
            }
            state.connections.is_empty()
        };
        if idle {
            self.destroy_service();
        } else {
            // Bound clients keep the service alive until they unbind.
            if let Some(service) = self.service() {
                service.on_stop_requested();
            }
            debug!("Stop requested while clients are bound");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.service().is_some_and(|s| s.is_started())
    }

    fn bind(&self, connection: Arc<dyn ServiceConnection>) -> Result<()> {
        let service = {
            let mut state = self.lock();
            let service = Self::ensure_service(&mut state, &self.notifications);
            state.connections.push(Arc::clone(&connection));
            service
        };
        service.on_bind();
        connection.on_service_connected(service);
        Ok(())
    }

    fn unbind(&self, connection: &Arc<dyn ServiceConnection>) -> Result<()> {
        let service = {
            let mut state = self.lock();
            let position = state
                .connections
                .iter()
                .position(|c| std::ptr::addr_eq(Arc::as_ptr(c), Arc::as_ptr(connection)))
                .ok_or(Error::ServiceNotBound)?;
            state.connections.remove(position);
            state.service.clone()
        };

        let Some(service) = service else {
            warn!("Binding outlived its service");
            return Err(Error::ServiceNotBound);
        };

        let command = service.on_unbind();
        let unused = !service.is_started() && service.bound_clients() == 0;
        if command == ServiceCommand::StopSelf || unused {
            self.destroy_service();
        }
        Ok(())
    }
}
