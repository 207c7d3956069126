//! Broadcast receivers: launch interception and system-dialog watching
//!
//! Both run on the host's broadcast dispatch context. They only match and
//! signal; the re-assertion itself runs on the reasserter's task.

use crate::host::{Broadcast, BroadcastReceiver};
use crate::policy::LockdownPolicy;
use crate::reasserter::ReassertSignal;
use crate::types::{
    InterceptDecision, InterceptKind, InterceptedEvent, KioskNotification, LaunchEvent,
    ReassertReason,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Priority of the launch interceptor registration
///
/// Must exceed the priority of stock launcher receivers (which register
/// at or below 100) so the kiosk gets first refusal on every launch.
pub const LAUNCH_INTERCEPT_PRIORITY: i32 = 999;

/// Priority of the system-dialog watcher registration
pub const SYSTEM_DIALOG_PRIORITY: i32 = 0;

/// Dialog-close reasons that indicate an escape attempt
const ESCAPE_REASONS: [&str; 2] = ["homekey", "recentapps"];

/// Vetoes launch broadcasts that match a blocked signature
pub struct LaunchInterceptor {
    policy: Arc<LockdownPolicy>,
    signal: ReassertSignal,
    notifications: broadcast::Sender<KioskNotification>,
}

impl LaunchInterceptor {
    pub fn new(
        policy: Arc<LockdownPolicy>,
        signal: ReassertSignal,
        notifications: broadcast::Sender<KioskNotification>,
    ) -> Self {
        Self {
            policy,
            signal,
            notifications,
        }
    }

    /// Decide whether a launch may proceed
    ///
    /// A veto also schedules a re-assertion, because aborting a launch can
    /// leave the foreground in an undefined state.
    pub fn on_launch_event(&self, event: &LaunchEvent) -> InterceptDecision {
        let Some(signature) = self.policy.matches_blocked_launch(event) else {
            tracing::trace!(action = %event.action, "Launch allowed");
            return InterceptDecision::Allow;
        };

        tracing::info!(
            action = %event.action,
            data = ?event.data,
            signature = %signature,
            "Blocked launch"
        );
        self.signal.request(ReassertReason::VetoedLaunch);
        let _ = self
            .notifications
            .send(KioskNotification::Intercepted(InterceptedEvent::new(
                InterceptKind::Launch,
                signature.to_string(),
            )));
        InterceptDecision::Veto
    }
}

impl BroadcastReceiver for LaunchInterceptor {
    fn on_receive(&self, broadcast: &Broadcast) -> InterceptDecision {
        match broadcast {
            Broadcast::Launch(event) => self.on_launch_event(event),
            _ => InterceptDecision::Allow,
        }
    }
}

/// Re-asserts the kiosk when the home or recents dialog is summoned
pub struct SystemDialogWatcher {
    signal: ReassertSignal,
}

impl SystemDialogWatcher {
    pub fn new(signal: ReassertSignal) -> Self {
        Self { signal }
    }
}

impl BroadcastReceiver for SystemDialogWatcher {
    fn on_receive(&self, broadcast: &Broadcast) -> InterceptDecision {
        if let Broadcast::CloseSystemDialogs {
            reason: Some(reason),
        } = broadcast
        {
            if ESCAPE_REASONS.contains(&reason.as_str()) {
                tracing::info!(reason = %reason, "Home or recents blocked");
                self.signal.request(ReassertReason::SystemDialog {
                    reason: reason.clone(),
                });
            }
        }
        // Dialog-close broadcasts are not abortable
        InterceptDecision::Allow
    }
}
