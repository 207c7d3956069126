//! Lifecycle reasserter — the enforcement state machine
//!
//! Owns the pinning controller and every receiver registration. All
//! transitions run under one async mutex, so concurrent `reassert()` calls
//! from the UI thread and the broadcast context never double-register.
//! The current state is mirrored in a `watch` channel for lock-free reads.
//!
//! ```text
//! Disabled ──enable()──► PinningActive ──pin lost & re-pin fails──► FallbackActive
//!     │                       │                                        ▲
//!     └──enable() (pin fails)─┴──────────promote_to_fallback()─────────┘
//! any ──disable()──► Disabled
//! ```
//!
//! There is no edge from `FallbackActive` back to `PinningActive` except
//! through `disable()` followed by `enable()`.

use crate::error::Result;
use crate::host::{BroadcastReceiver, KioskHost, ReceiverKind, RegistrationHandle};
use crate::interceptor::{
    LaunchInterceptor, SystemDialogWatcher, LAUNCH_INTERCEPT_PRIORITY, SYSTEM_DIALOG_PRIORITY,
};
use crate::pinning::{Pinned, PinningController};
use crate::policy::LockdownPolicy;
use crate::types::{EnforcementState, KioskNotification, ReassertReason};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};

/// Sending half of the re-assertion request queue
///
/// Cheap to clone and safe to call from any thread; never blocks.
#[derive(Debug, Clone)]
pub struct ReassertSignal {
    tx: mpsc::UnboundedSender<ReassertReason>,
}

impl ReassertSignal {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReassertReason>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn request(&self, reason: ReassertReason) {
        if self.tx.send(reason).is_err() {
            tracing::debug!("Re-assertion loop stopped; request dropped");
        }
    }
}

/// Live registrations held by the reasserter
///
/// At most one handle per receiver kind exists at any time.
#[derive(Debug, Default)]
pub struct InterceptorRegistration {
    launch_interceptor: Option<RegistrationHandle>,
    system_dialogs: Option<RegistrationHandle>,
    pinning: Option<Pinned>,
}

impl InterceptorRegistration {
    pub fn launch_interceptor(&self) -> Option<&RegistrationHandle> {
        self.launch_interceptor.as_ref()
    }

    pub fn system_dialogs(&self) -> Option<&RegistrationHandle> {
        self.system_dialogs.as_ref()
    }

    pub fn pinning(&self) -> Option<Pinned> {
        self.pinning
    }
}

/// Orchestrates lockdown across lifecycle transitions
pub struct Reasserter {
    host: Arc<dyn KioskHost>,
    policy: Arc<LockdownPolicy>,
    pinning: PinningController,
    signal: ReassertSignal,
    notifications: broadcast::Sender<KioskNotification>,
    state: watch::Sender<EnforcementState>,
    registration: Mutex<InterceptorRegistration>,
    sanitizer_armed: AtomicBool,
}

impl Reasserter {
    pub fn new(
        host: Arc<dyn KioskHost>,
        policy: Arc<LockdownPolicy>,
        pinning_timeout: Duration,
        signal: ReassertSignal,
        notifications: broadcast::Sender<KioskNotification>,
    ) -> Self {
        let (state, _) = watch::channel(EnforcementState::Disabled);
        Self {
            pinning: PinningController::new(Arc::clone(&host), pinning_timeout),
            host,
            policy,
            signal,
            notifications,
            state,
            registration: Mutex::new(InterceptorRegistration::default()),
            sanitizer_armed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> EnforcementState {
        *self.state.borrow()
    }

    /// Watch enforcement state changes
    pub fn subscribe_state(&self) -> watch::Receiver<EnforcementState> {
        self.state.subscribe()
    }

    pub fn is_in_fallback_mode(&self) -> bool {
        self.state() == EnforcementState::FallbackActive
    }

    /// Whether inbound deep links are currently sanitized
    pub fn deep_link_sanitizer_armed(&self) -> bool {
        self.sanitizer_armed.load(Ordering::Acquire)
    }

    /// Run `f` against the current registrations
    pub async fn with_registration<T>(&self, f: impl FnOnce(&InterceptorRegistration) -> T) -> T {
        let registration = self.registration.lock().await;
        f(&registration)
    }

    /// Lock the device down, preferring native pinning
    ///
    /// No-op outside `Disabled`. A pinning failure promotes straight to
    /// fallback without retrying.
    pub async fn enable(&self) -> EnforcementState {
        let mut reg = self.registration.lock().await;
        let current = self.state();
        if current != EnforcementState::Disabled {
            tracing::debug!(state = ?current, "Lockdown already enabled");
            return current;
        }

        tracing::info!(host = self.host.name(), "Enabling lockdown");
        self.apply_base_lockdown(&mut reg).await;

        match self.pinning.request_pinning().await {
            Ok(pinned) => {
                reg.pinning = Some(pinned);
                self.transition(EnforcementState::PinningActive);
            }
            Err(e) => {
                tracing::info!(error = %e, "Pinning unavailable, promoting to fallback");
                self.enter_fallback(&mut reg).await;
            }
        }
        self.state()
    }

    /// Restore lockdown invariants after a focus, resume, or block event
    pub async fn reassert(&self) -> EnforcementState {
        let mut reg = self.registration.lock().await;
        let current = self.state();
        if current == EnforcementState::Disabled {
            return current;
        }

        self.hide_chrome().await;
        if reg.system_dialogs.is_none() {
            self.register_dialog_watcher(&mut reg).await;
        }

        match current {
            EnforcementState::PinningActive => {
                if !self.pinning.is_pinned().await {
                    tracing::warn!("Pinning lost, re-requesting");
                    reg.pinning = None;
                    match self.pinning.request_pinning().await {
                        Ok(pinned) => reg.pinning = Some(pinned),
                        Err(e) => {
                            tracing::info!(error = %e, "Re-pinning failed, promoting to fallback");
                            self.enter_fallback(&mut reg).await;
                        }
                    }
                }
            }
            EnforcementState::FallbackActive => {
                if reg.launch_interceptor.is_none() {
                    self.register_launch_interceptor(&mut reg).await;
                }
            }
            EnforcementState::Disabled => {}
        }
        self.state()
    }

    /// Switch to manual interception
    ///
    /// Re-registers the launch interceptor (releasing any stale handle) and
    /// arms the deep-link sanitizer. From `Disabled` the base lockdown is
    /// applied first.
    pub async fn promote_to_fallback(&self) -> EnforcementState {
        let mut reg = self.registration.lock().await;
        if self.state() == EnforcementState::Disabled {
            self.apply_base_lockdown(&mut reg).await;
        }
        self.enter_fallback(&mut reg).await;
        self.state()
    }

    /// Release every registration and pinning
    pub async fn disable(&self) -> EnforcementState {
        let mut reg = self.registration.lock().await;

        self.sanitizer_armed.store(false, Ordering::Release);
        // Handles that fail to release stay in their slot for the next attempt
        self.unregister(&mut reg.launch_interceptor).await;
        self.unregister(&mut reg.system_dialogs).await;

        self.pinning.release_pinning().await;
        reg.pinning = None;

        log_failure("show_system_chrome", self.host.show_system_chrome().await);
        self.transition(EnforcementState::Disabled);
        tracing::info!("Lockdown disabled");
        EnforcementState::Disabled
    }

    /// Handle a queued re-assertion request
    pub async fn handle_signal(&self, reason: ReassertReason) {
        if self.state() == EnforcementState::Disabled {
            tracing::debug!(reason = ?reason, "Ignoring re-assertion while disabled");
            return;
        }

        match reason {
            ReassertReason::BlockedKey { .. } => {
                log_failure("close_system_dialogs", self.host.close_system_dialogs().await);
            }
            ReassertReason::VetoedLaunch | ReassertReason::SystemDialog { .. } => {
                log_failure("bring_to_front", self.host.bring_to_front().await);
            }
            ReassertReason::BlockedDeepLink => {}
        }
        self.reassert().await;

        let _ = self
            .notifications
            .send(KioskNotification::Reasserted(reason));
    }

    /// Try to regain the foreground; not a state transition
    pub async fn bring_to_front(&self) {
        if self.state() == EnforcementState::Disabled {
            return;
        }
        log_failure("bring_to_front", self.host.bring_to_front().await);
    }

    async fn apply_base_lockdown(&self, reg: &mut InterceptorRegistration) {
        log_failure("keep_screen_awake", self.host.keep_screen_awake().await);

        for package in self.policy.blocked_packages() {
            match self.host.set_component_enabled(package, false).await {
                Ok(()) => tracing::info!(package = %package, "Disabled content app"),
                Err(e) => tracing::debug!(package = %package, error = %e, "Could not disable content app"),
            }
        }

        self.hide_chrome().await;
        self.register_dialog_watcher(reg).await;
    }

    async fn enter_fallback(&self, reg: &mut InterceptorRegistration) {
        log_failure("keep_screen_awake", self.host.keep_screen_awake().await);
        self.hide_chrome().await;
        self.register_launch_interceptor(reg).await;
        self.sanitizer_armed.store(true, Ordering::Release);
        self.transition(EnforcementState::FallbackActive);
    }

    async fn register_launch_interceptor(&self, reg: &mut InterceptorRegistration) {
        let interceptor = Arc::new(LaunchInterceptor::new(
            Arc::clone(&self.policy),
            self.signal.clone(),
            self.notifications.clone(),
        ));
        self.register(
            &mut reg.launch_interceptor,
            ReceiverKind::Launch,
            LAUNCH_INTERCEPT_PRIORITY,
            interceptor,
        )
        .await;
    }

    async fn register_dialog_watcher(&self, reg: &mut InterceptorRegistration) {
        let watcher = Arc::new(SystemDialogWatcher::new(self.signal.clone()));
        self.register(
            &mut reg.system_dialogs,
            ReceiverKind::SystemDialogs,
            SYSTEM_DIALOG_PRIORITY,
            watcher,
        )
        .await;
    }

    /// Replace the registration in `slot`, releasing any stale handle first
    ///
    /// If the stale handle cannot be released it stays in the slot and no
    /// new receiver is registered, since the old one may still be live. A
    /// failed registration leaves the slot empty; enforcement continues on
    /// the remaining layers.
    async fn register(
        &self,
        slot: &mut Option<RegistrationHandle>,
        kind: ReceiverKind,
        priority: i32,
        receiver: Arc<dyn BroadcastReceiver>,
    ) {
        if !self.unregister(slot).await {
            tracing::warn!(kind = %kind, "Stale receiver still registered, keeping it");
            return;
        }

        match self.host.register_receiver(kind, priority, receiver).await {
            Ok(handle) => {
                tracing::info!(kind = %kind, priority, handle = %handle, "Receiver registered");
                *slot = Some(handle);
            }
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Receiver registration failed, continuing degraded");
            }
        }
    }

    /// Release the handle in `slot`; returns `false` if it is still held
    async fn unregister(&self, slot: &mut Option<RegistrationHandle>) -> bool {
        let Some(handle) = slot.take() else {
            return true;
        };
        match self.host.unregister_receiver(&handle).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(handle = %handle, error = %e, "Failed to unregister receiver");
                *slot = Some(handle);
                false
            }
        }
    }

    async fn hide_chrome(&self) {
        log_failure("hide_system_chrome", self.host.hide_system_chrome().await);
    }

    fn transition(&self, next: EnforcementState) {
        let previous = self.state.send_replace(next);
        if previous == next {
            return;
        }
        tracing::info!(from = ?previous, to = ?next, "Enforcement state changed");

        let was_fallback = previous == EnforcementState::FallbackActive;
        let is_fallback = next == EnforcementState::FallbackActive;
        if was_fallback != is_fallback {
            let _ = self
                .notifications
                .send(KioskNotification::FallbackModeChanged(is_fallback));
        }
    }
}

fn log_failure(op: &'static str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(op, error = %e, "Host call failed");
    }
}
