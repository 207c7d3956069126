//! Host platform trait — the capabilities the kiosk core consumes
//!
//! The core never reimplements windowing, task pinning, or broadcast
//! delivery. A host (Android activity glue, a desktop shell, the in-memory
//! simulator) implements `KioskHost` and the core drives it.

use crate::error::Result;
use crate::types::{InterceptDecision, LaunchEvent};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub mod memory;

/// Core trait for host platforms
///
/// Every method may fail; the core decides which failures are fatal
/// (none are) and which trigger fallback promotion.
#[async_trait]
pub trait KioskHost: Send + Sync {
    /// Ask for exclusive-foreground (task pinning) status
    async fn start_pinning(&self) -> Result<()>;

    /// Leave exclusive-foreground status
    async fn stop_pinning(&self) -> Result<()>;

    /// Poll current pinning status
    async fn is_pinned(&self) -> Result<bool>;

    /// Enter immersive mode: hide status and navigation bars
    async fn hide_system_chrome(&self) -> Result<()>;

    /// Restore normal system chrome visibility
    async fn show_system_chrome(&self) -> Result<()>;

    /// Bring the kiosk application back to the foreground
    async fn bring_to_front(&self) -> Result<()>;

    /// Dismiss any open system dialog (recents, launcher overlays)
    async fn close_system_dialogs(&self) -> Result<()>;

    /// Subscribe a receiver to an ordered broadcast channel
    ///
    /// Receivers with higher priority see a broadcast first. A `Veto`
    /// aborts delivery to lower-priority receivers.
    async fn register_receiver(
        &self,
        kind: ReceiverKind,
        priority: i32,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> Result<RegistrationHandle>;

    /// Remove a previously registered receiver
    ///
    /// Removing a handle the host no longer knows is not an error. An
    /// `Err` means the receiver may still be live.
    async fn unregister_receiver(&self, handle: &RegistrationHandle) -> Result<()>;

    /// Enable or disable an installed application's launcher component
    async fn set_component_enabled(&self, package: &str, enabled: bool) -> Result<()>;

    /// Keep the screen on and show above the keyguard
    ///
    /// Default implementation does nothing. Hosts without a lock screen
    /// or display sleep need not override this.
    async fn keep_screen_awake(&self) -> Result<()> {
        Ok(())
    }

    /// Host name (e.g., "android", "memory")
    fn name(&self) -> &str;
}

/// Broadcast channels the core subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverKind {
    /// Application launch notifications
    Launch,
    /// System dialog dismissals (home key, recent apps)
    SystemDialogs,
}

impl fmt::Display for ReceiverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverKind::Launch => write!(f, "launch"),
            ReceiverKind::SystemDialogs => write!(f, "system-dialogs"),
        }
    }
}

/// A broadcast delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Broadcast {
    /// Another application is about to start
    Launch(LaunchEvent),
    /// System dialogs were closed; `reason` is e.g. "homekey" or "recentapps"
    CloseSystemDialogs { reason: Option<String> },
}

impl Broadcast {
    pub fn kind(&self) -> ReceiverKind {
        match self {
            Broadcast::Launch(_) => ReceiverKind::Launch,
            Broadcast::CloseSystemDialogs { .. } => ReceiverKind::SystemDialogs,
        }
    }
}

/// Callback invoked by the host for each broadcast on a subscribed channel
///
/// Runs on the host's broadcast dispatch context, which may differ from
/// the UI dispatch thread. Implementations must not block.
pub trait BroadcastReceiver: Send + Sync {
    fn on_receive(&self, broadcast: &Broadcast) -> InterceptDecision;
}

/// Opaque handle for a live receiver registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(String);

impl RegistrationHandle {
    /// Allocate a fresh handle (reg-<uuid>)
    pub fn generate() -> Self {
        Self(format!("reg-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
