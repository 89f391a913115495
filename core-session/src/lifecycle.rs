//! Foreground Lifecycle State Machine
//!
//! ## Overview
//!
//! Drives wake lock, foreground mode and notification visibility from edges in
//! the playback state. The machine itself is edge-agnostic: the bridge decides
//! *when* to call [`ForegroundLifecycle::enter_playing`],
//! [`ForegroundLifecycle::exit_playing`] and [`ForegroundLifecycle::teardown`];
//! this module decides *what* each of them does to the host.
//!
//! Every host step checks the current host state first (session already
//! active, wake lock already held, ...) so repeated triggers are harmless.
//! Teardown can be reached from the idle edge and from the runtime's own
//! termination callback at the same time; it runs each step at most once per
//! active period and keeps going when a step fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::session::{NotificationSpec, PlatformSessionHost, NOTIFICATION_ID};
use core_runtime::events::{EventBus, LifecycleEvent, SessionEvent};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;

#[derive(Debug, Default, Clone, Copy)]
struct Flags {
    foreground: bool,
    notification_created: bool,
    stop_requested: bool,
}

/// Counters of lifecycle transitions since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStats {
    pub enter_playing: u64,
    pub exit_playing: u64,
    pub teardowns: u64,
}

pub struct ForegroundLifecycle {
    host: Arc<dyn PlatformSessionHost>,
    events: Arc<EventBus>,
    flags: Mutex<Flags>,
    enter_count: AtomicU64,
    exit_count: AtomicU64,
    teardown_count: AtomicU64,
}

impl ForegroundLifecycle {
    pub fn new(host: Arc<dyn PlatformSessionHost>, events: Arc<EventBus>) -> Self {
        Self {
            host,
            events,
            flags: Mutex::new(Flags::default()),
            enter_count: AtomicU64::new(0),
            exit_count: AtomicU64::new(0),
            teardown_count: AtomicU64::new(0),
        }
    }

    /// Marks the platform session active so the system routes buttons to it.
    pub async fn activate(&self) -> Result<()> {
        self.flags.lock().stop_requested = false;
        if self.host.is_session_active() {
            return Ok(());
        }
        self.host.set_session_active(true).await?;
        info!("Platform session activated");
        self.emit(LifecycleEvent::SessionActivated);
        Ok(())
    }

    /// Promotes to foreground with `notification` and holds the wake lock.
    #[instrument(skip(self, notification), fields(playing = notification.playing))]
    pub async fn enter_playing(&self, notification: &NotificationSpec) -> Result<()> {
        self.enter_count.fetch_add(1, Ordering::SeqCst);
        self.resume_foreground(notification).await
    }

    /// Takes the foreground resources without opening a new playing period.
    ///
    /// Used when playback stayed on across a teardown and the session starts
    /// again: the period never closed, but everything it held was released.
    pub async fn resume_foreground(&self, notification: &NotificationSpec) -> Result<()> {
        self.activate().await?;

        if !self.host.is_wake_lock_held() {
            self.host.acquire_wake_lock().await?;
        }
        self.host.start_foreground(notification).await?;

        {
            let mut flags = self.flags.lock();
            flags.foreground = true;
            flags.notification_created = true;
        }
        debug!("Entered foreground playback");
        self.emit(LifecycleEvent::EnteredForeground);
        Ok(())
    }

    /// Leaves the playing state. Returns whether foreground mode was dropped.
    ///
    /// With `stop_foreground_on_pause` unset the service stays foregrounded so
    /// the notification controls keep working while paused.
    #[instrument(skip(self))]
    pub async fn exit_playing(&self, stop_foreground_on_pause: bool) -> Result<bool> {
        self.exit_count.fetch_add(1, Ordering::SeqCst);

        let demoted = stop_foreground_on_pause && self.flags.lock().foreground;
        if demoted {
            self.host.stop_foreground(false).await?;
            if self.host.is_wake_lock_held() {
                self.host.release_wake_lock().await?;
            }
            self.flags.lock().foreground = false;
        }

        debug!(demoted, "Left playing state");
        self.emit(LifecycleEvent::LeftPlaying { demoted });
        Ok(demoted)
    }

    /// Re-posts the notification if it was ever shown. Returns whether it was.
    pub async fn refresh_notification(&self, notification: &NotificationSpec) -> Result<bool> {
        if !self.flags.lock().notification_created {
            return Ok(false);
        }
        self.host.post_notification(notification).await?;
        Ok(true)
    }

    /// Releases everything. Safe to call any number of times.
    ///
    /// Step failures are logged and reported as
    /// [`LifecycleEvent::TeardownFailed`]; the remaining steps still run.
    #[instrument(skip(self))]
    pub async fn teardown(&self) {
        let (foreground, notification_created, stop_requested) = {
            let mut flags = self.flags.lock();
            let snapshot = (flags.foreground, flags.notification_created, flags.stop_requested);
            flags.foreground = false;
            flags.notification_created = false;
            flags.stop_requested = true;
            snapshot
        };

        if self.host.is_session_active() {
            let outcome = self.host.set_session_active(false).await;
            self.step("deactivate_session", outcome);
        }
        if foreground {
            let outcome = self.host.stop_foreground(true).await;
            self.step("stop_foreground", outcome);
        }
        if notification_created {
            let outcome = self.host.cancel_notification(NOTIFICATION_ID).await;
            self.step("cancel_notification", outcome);
        }
        if self.host.is_wake_lock_held() {
            let outcome = self.host.release_wake_lock().await;
            self.step("release_wake_lock", outcome);
        }
        if !stop_requested {
            let outcome = self.host.request_stop_self().await;
            self.step("request_stop_self", outcome);
        }

        let teardowns = self.teardown_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(teardowns, "Session torn down");
        self.emit(LifecycleEvent::TornDown);
    }

    fn step(&self, step: &str, outcome: BridgeResult<()>) {
        if let Err(e) = outcome {
            warn!(step, error = %e, "Teardown step failed, continuing");
            self.emit(LifecycleEvent::TeardownFailed {
                step: step.to_string(),
                message: e.to_string(),
            });
        }
    }

    pub fn is_foreground(&self) -> bool {
        self.flags.lock().foreground
    }

    pub fn notification_created(&self) -> bool {
        self.flags.lock().notification_created
    }

    pub fn stats(&self) -> LifecycleStats {
        LifecycleStats {
            enter_playing: self.enter_count.load(Ordering::SeqCst),
            exit_playing: self.exit_count.load(Ordering::SeqCst),
            teardowns: self.teardown_count.load(Ordering::SeqCst),
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        let _ = self.events.emit(SessionEvent::Lifecycle(event));
    }
}

impl std::fmt::Debug for ForegroundLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForegroundLifecycle")
            .field("host", &"<PlatformSessionHost>")
            .field("flags", &*self.flags.lock())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::HeadlessSessionHost;
    use bridge_traits::error::BridgeError;

    fn spec(playing: bool) -> NotificationSpec {
        NotificationSpec {
            id: NOTIFICATION_ID,
            channel_id: "test.channel".to_string(),
            channel_name: None,
            channel_description: None,
            title: Some("Song".to_string()),
            subtitle: None,
            icon: "mipmap/ic_launcher".to_string(),
            color: None,
            ongoing: false,
            show_badge: false,
            click_starts_activity: true,
            activity_class_name: None,
            actions: Vec::new(),
            compact_action_indices: Vec::new(),
            playing,
        }
    }

    fn lifecycle() -> (Arc<HeadlessSessionHost>, ForegroundLifecycle) {
        let host = Arc::new(HeadlessSessionHost::new());
        let lifecycle = ForegroundLifecycle::new(host.clone(), Arc::new(EventBus::new(32)));
        (host, lifecycle)
    }

    #[tokio::test]
    async fn test_enter_playing_acquires_everything() {
        let (host, lifecycle) = lifecycle();
        lifecycle.enter_playing(&spec(true)).await.unwrap();

        assert!(host.is_session_active());
        assert!(host.is_wake_lock_held());
        assert!(host.is_foreground());
        assert!(lifecycle.notification_created());
        assert_eq!(host.counters().wake_lock_acquired, 1);
    }

    #[tokio::test]
    async fn test_wake_lock_acquire_is_idempotent() {
        let (host, lifecycle) = lifecycle();
        lifecycle.enter_playing(&spec(true)).await.unwrap();
        lifecycle.enter_playing(&spec(true)).await.unwrap();
        assert_eq!(host.counters().wake_lock_acquired, 1);
        assert_eq!(host.counters().session_activated, 1);
    }

    #[tokio::test]
    async fn test_resume_after_teardown_keeps_period_open() {
        let (host, lifecycle) = lifecycle();
        lifecycle.enter_playing(&spec(true)).await.unwrap();
        lifecycle.teardown().await;
        assert!(!host.is_wake_lock_held());

        lifecycle.resume_foreground(&spec(true)).await.unwrap();
        assert!(host.is_foreground());
        assert!(host.is_wake_lock_held());
        assert!(lifecycle.notification_created());

        let stats = lifecycle.stats();
        assert_eq!((stats.enter_playing, stats.exit_playing), (1, 0));
    }

    #[tokio::test]
    async fn test_exit_playing_respects_stop_on_pause() {
        let (host, lifecycle) = lifecycle();
        lifecycle.enter_playing(&spec(true)).await.unwrap();

        assert!(!lifecycle.exit_playing(false).await.unwrap());
        assert!(host.is_foreground());
        assert!(host.is_wake_lock_held());

        assert!(lifecycle.exit_playing(true).await.unwrap());
        assert!(!host.is_foreground());
        assert!(!host.is_wake_lock_held());
        // Demotion keeps the notification
        assert!(lifecycle.notification_created());
    }

    #[tokio::test]
    async fn test_refresh_only_after_created() {
        let (host, lifecycle) = lifecycle();
        assert!(!lifecycle.refresh_notification(&spec(false)).await.unwrap());
        assert_eq!(host.counters().notifications_posted, 0);

        lifecycle.enter_playing(&spec(true)).await.unwrap();
        assert!(lifecycle.refresh_notification(&spec(false)).await.unwrap());
        assert_eq!(host.counters().notifications_posted, 1);
        assert_eq!(host.last_notification().map(|n| n.playing), Some(false));
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let (host, lifecycle) = lifecycle();
        lifecycle.enter_playing(&spec(true)).await.unwrap();

        lifecycle.teardown().await;
        lifecycle.teardown().await;

        let counters = host.counters();
        assert_eq!(counters.session_deactivated, 1);
        assert_eq!(counters.notifications_cancelled, 1);
        assert_eq!(counters.wake_lock_released, 1);
        assert_eq!(counters.stop_self_requested, 1);
        assert!(!host.is_session_active());
        assert!(!host.is_wake_lock_held());
        assert_eq!(lifecycle.stats().teardowns, 2);
    }

    #[tokio::test]
    async fn test_teardown_continues_after_failed_step() {
        let (host, lifecycle) = lifecycle();
        lifecycle.enter_playing(&spec(true)).await.unwrap();
        host.fail_next("stop_foreground", BridgeError::OperationFailed("denied".to_string()));

        let events = Arc::clone(&lifecycle.events);
        let mut stream = events
            .stream()
            .filter(|e| matches!(e, SessionEvent::Lifecycle(LifecycleEvent::TeardownFailed { .. })));

        lifecycle.teardown().await;

        assert!(!host.is_wake_lock_held());
        assert_eq!(host.counters().stop_self_requested, 1);
        match stream.try_recv() {
            Some(Ok(SessionEvent::Lifecycle(LifecycleEvent::TeardownFailed { step, .. }))) => {
                assert_eq!(step, "stop_foreground")
            }
            other => panic!("expected teardown failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_activate_after_teardown_rearms_stop_request() {
        let (host, lifecycle) = lifecycle();
        lifecycle.enter_playing(&spec(true)).await.unwrap();
        lifecycle.teardown().await;

        lifecycle.enter_playing(&spec(true)).await.unwrap();
        lifecycle.teardown().await;
        assert_eq!(host.counters().stop_self_requested, 2);
    }
}
