//! In-memory host for testing and single-process use
//!
//! Simulates pinning, chrome visibility, and ordered broadcast delivery,
//! and records every call so tests can assert on side effects.

use crate::error::{KioskError, Result};
use crate::host::{Broadcast, BroadcastReceiver, KioskHost, ReceiverKind, RegistrationHandle};
use crate::types::InterceptDecision;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Behavior knobs for the simulated host
#[derive(Debug, Clone)]
pub struct MemoryHostConfig {
    /// Whether pinning requests succeed
    pub pinning_supported: bool,

    /// Artificial latency added to every pinning request
    pub pinning_delay: Option<Duration>,

    /// Artificial latency added to every pinning status poll
    pub status_delay: Option<Duration>,

    /// Whether pinning status polls fail
    pub fail_status: bool,

    /// Whether receiver registration fails
    pub fail_registration: bool,

    /// Whether receiver removal fails, leaving the receiver live
    pub fail_unregister: bool,

    /// Whether chrome and focus calls fail
    pub fail_window_calls: bool,
}

impl Default for MemoryHostConfig {
    fn default() -> Self {
        Self {
            pinning_supported: true,
            pinning_delay: None,
            status_delay: None,
            fail_status: false,
            fail_registration: false,
            fail_unregister: false,
            fail_window_calls: false,
        }
    }
}

struct Registered {
    handle: RegistrationHandle,
    kind: ReceiverKind,
    priority: i32,
    receiver: Arc<dyn BroadcastReceiver>,
}

#[derive(Default)]
struct HostState {
    pinned: bool,
    chrome_hidden: bool,
    screen_awake: bool,
    receivers: Vec<Registered>,
    disabled_components: HashSet<String>,
    pin_requests: usize,
    hide_chrome_calls: usize,
    bring_to_front_calls: usize,
    close_dialog_calls: usize,
}

/// Simulated host platform
#[derive(Default)]
pub struct MemoryHost {
    config: Mutex<MemoryHostConfig>,
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new(config: MemoryHostConfig) -> Self {
        Self {
            config: Mutex::new(config),
            state: Mutex::new(HostState::default()),
        }
    }

    /// A host that refuses every pinning request
    pub fn without_pinning() -> Self {
        Self::new(MemoryHostConfig {
            pinning_supported: false,
            ..Default::default()
        })
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn config(&self) -> MemoryHostConfig {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn update_config(&self, f: impl FnOnce(&mut MemoryHostConfig)) {
        let mut config = self.config.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut config);
    }

    pub fn set_pinning_supported(&self, supported: bool) {
        self.update_config(|c| c.pinning_supported = supported);
    }

    pub fn set_fail_registration(&self, fail: bool) {
        self.update_config(|c| c.fail_registration = fail);
    }

    pub fn set_status_delay(&self, delay: Option<Duration>) {
        self.update_config(|c| c.status_delay = delay);
    }

    pub fn set_fail_status(&self, fail: bool) {
        self.update_config(|c| c.fail_status = fail);
    }

    pub fn set_fail_unregister(&self, fail: bool) {
        self.update_config(|c| c.fail_unregister = fail);
    }

    pub fn set_fail_window_calls(&self, fail: bool) {
        self.update_config(|c| c.fail_window_calls = fail);
    }

    /// Simulate the platform dropping pinning (e.g., user escape gesture)
    pub fn revoke_pinning(&self) {
        self.state().pinned = false;
    }

    /// Deliver an ordered broadcast, highest priority first
    ///
    /// Returns `Veto` if any receiver aborted delivery.
    pub fn dispatch(&self, broadcast: &Broadcast) -> InterceptDecision {
        let kind = broadcast.kind();
        let mut targets: Vec<(i32, Arc<dyn BroadcastReceiver>)> = self
            .state()
            .receivers
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| (r.priority, Arc::clone(&r.receiver)))
            .collect();
        // Stable sort keeps registration order among equal priorities
        targets.sort_by(|a, b| b.0.cmp(&a.0));

        for (priority, receiver) in targets {
            if receiver.on_receive(broadcast) == InterceptDecision::Veto {
                tracing::debug!(priority, kind = %kind, "Broadcast aborted");
                return InterceptDecision::Veto;
            }
        }
        InterceptDecision::Allow
    }

    pub fn registration_count(&self, kind: ReceiverKind) -> usize {
        self.state()
            .receivers
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn pinned(&self) -> bool {
        self.state().pinned
    }

    pub fn chrome_hidden(&self) -> bool {
        self.state().chrome_hidden
    }

    pub fn screen_awake(&self) -> bool {
        self.state().screen_awake
    }

    pub fn is_component_disabled(&self, package: &str) -> bool {
        self.state().disabled_components.contains(package)
    }

    pub fn pin_requests(&self) -> usize {
        self.state().pin_requests
    }

    pub fn hide_chrome_calls(&self) -> usize {
        self.state().hide_chrome_calls
    }

    pub fn bring_to_front_calls(&self) -> usize {
        self.state().bring_to_front_calls
    }

    pub fn close_dialog_calls(&self) -> usize {
        self.state().close_dialog_calls
    }

    fn check_window_calls(&self, op: &str) -> Result<()> {
        if self.config().fail_window_calls {
            return Err(KioskError::Host(format!("{} rejected by window manager", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl KioskHost for MemoryHost {
    async fn start_pinning(&self) -> Result<()> {
        let config = self.config();
        self.state().pin_requests += 1;

        if let Some(delay) = config.pinning_delay {
            tokio::time::sleep(delay).await;
        }

        if !config.pinning_supported {
            return Err(KioskError::PinningUnavailable(
                "Lock task mode not permitted for this package".to_string(),
            ));
        }

        self.state().pinned = true;
        Ok(())
    }

    async fn stop_pinning(&self) -> Result<()> {
        self.state().pinned = false;
        Ok(())
    }

    async fn is_pinned(&self) -> Result<bool> {
        let config = self.config();
        if let Some(delay) = config.status_delay {
            tokio::time::sleep(delay).await;
        }
        if config.fail_status {
            return Err(KioskError::Host("lock task state unavailable".to_string()));
        }
        Ok(self.state().pinned)
    }

    async fn hide_system_chrome(&self) -> Result<()> {
        self.check_window_calls("hide_system_chrome")?;
        let mut state = self.state();
        state.hide_chrome_calls += 1;
        state.chrome_hidden = true;
        Ok(())
    }

    async fn show_system_chrome(&self) -> Result<()> {
        self.check_window_calls("show_system_chrome")?;
        self.state().chrome_hidden = false;
        Ok(())
    }

    async fn bring_to_front(&self) -> Result<()> {
        self.check_window_calls("bring_to_front")?;
        self.state().bring_to_front_calls += 1;
        Ok(())
    }

    async fn close_system_dialogs(&self) -> Result<()> {
        self.state().close_dialog_calls += 1;
        Ok(())
    }

    async fn register_receiver(
        &self,
        kind: ReceiverKind,
        priority: i32,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> Result<RegistrationHandle> {
        if self.config().fail_registration {
            return Err(KioskError::Registration {
                channel: kind.to_string(),
                reason: "receiver registration denied".to_string(),
            });
        }

        let handle = RegistrationHandle::generate();
        self.state().receivers.push(Registered {
            handle: handle.clone(),
            kind,
            priority,
            receiver,
        });
        Ok(handle)
    }

    async fn unregister_receiver(&self, handle: &RegistrationHandle) -> Result<()> {
        if self.config().fail_unregister {
            return Err(KioskError::Host(format!("Failed to unregister {}", handle)));
        }
        self.state().receivers.retain(|r| &r.handle != handle);
        Ok(())
    }

    async fn set_component_enabled(&self, package: &str, enabled: bool) -> Result<()> {
        let mut state = self.state();
        if enabled {
            state.disabled_components.remove(package);
        } else {
            state.disabled_components.insert(package.to_string());
        }
        Ok(())
    }

    async fn keep_screen_awake(&self) -> Result<()> {
        self.state().screen_awake = true;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LaunchEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        decision: InterceptDecision,
        seen: AtomicUsize,
    }

    impl Recorder {
        fn new(decision: InterceptDecision) -> Arc<Self> {
            Arc::new(Self {
                decision,
                seen: AtomicUsize::new(0),
            })
        }
    }

    impl BroadcastReceiver for Recorder {
        fn on_receive(&self, _broadcast: &Broadcast) -> InterceptDecision {
            self.seen.fetch_add(1, Ordering::SeqCst);
            self.decision
        }
    }

    fn launch() -> Broadcast {
        Broadcast::Launch(LaunchEvent::new("MAIN"))
    }

    #[tokio::test]
    async fn test_pinning_roundtrip() {
        let host = MemoryHost::default();
        host.start_pinning().await.unwrap();
        assert!(host.is_pinned().await.unwrap());
        host.stop_pinning().await.unwrap();
        assert!(!host.pinned());
        assert_eq!(host.pin_requests(), 1);
    }

    #[tokio::test]
    async fn test_pinning_unsupported() {
        let host = MemoryHost::without_pinning();
        let err = host.start_pinning().await.unwrap_err();
        assert!(matches!(err, KioskError::PinningUnavailable(_)));
        assert!(!host.pinned());
    }

    #[tokio::test]
    async fn test_dispatch_priority_order_and_abort() {
        let host = MemoryHost::default();
        let low = Recorder::new(InterceptDecision::Allow);
        let high = Recorder::new(InterceptDecision::Veto);

        host.register_receiver(ReceiverKind::Launch, 100, low.clone())
            .await
            .unwrap();
        host.register_receiver(ReceiverKind::Launch, 999, high.clone())
            .await
            .unwrap();

        assert_eq!(host.dispatch(&launch()), InterceptDecision::Veto);
        assert_eq!(high.seen.load(Ordering::SeqCst), 1);
        assert_eq!(low.seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_filters_by_kind() {
        let host = MemoryHost::default();
        let dialogs = Recorder::new(InterceptDecision::Veto);
        host.register_receiver(ReceiverKind::SystemDialogs, 0, dialogs.clone())
            .await
            .unwrap();

        assert_eq!(host.dispatch(&launch()), InterceptDecision::Allow);
        assert_eq!(dialogs.seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unregister() {
        let host = MemoryHost::default();
        let handle = host
            .register_receiver(ReceiverKind::Launch, 0, Recorder::new(InterceptDecision::Allow))
            .await
            .unwrap();
        assert!(handle.as_str().starts_with("reg-"));
        assert_eq!(host.registration_count(ReceiverKind::Launch), 1);

        host.unregister_receiver(&handle).await.unwrap();
        assert_eq!(host.registration_count(ReceiverKind::Launch), 0);

        // Unknown handles are already gone
        host.unregister_receiver(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_unregister_failure_keeps_receiver() {
        let host = MemoryHost::default();
        let handle = host
            .register_receiver(ReceiverKind::Launch, 0, Recorder::new(InterceptDecision::Allow))
            .await
            .unwrap();

        host.set_fail_unregister(true);
        assert!(host.unregister_receiver(&handle).await.is_err());
        assert_eq!(host.registration_count(ReceiverKind::Launch), 1);
    }

    #[tokio::test]
    async fn test_status_failure() {
        let host = MemoryHost::default();
        host.start_pinning().await.unwrap();
        host.set_fail_status(true);

        assert!(matches!(host.is_pinned().await, Err(KioskError::Host(_))));
        assert!(host.pinned());
    }

    #[tokio::test]
    async fn test_registration_failure() {
        let host = MemoryHost::default();
        host.set_fail_registration(true);
        let err = host
            .register_receiver(ReceiverKind::Launch, 0, Recorder::new(InterceptDecision::Allow))
            .await
            .unwrap_err();
        assert!(matches!(err, KioskError::Registration { .. }));
    }

    #[tokio::test]
    async fn test_component_toggle() {
        let host = MemoryHost::default();
        host.set_component_enabled("com.netflix.ninja", false)
            .await
            .unwrap();
        assert!(host.is_component_disabled("com.netflix.ninja"));
        host.set_component_enabled("com.netflix.ninja", true)
            .await
            .unwrap();
        assert!(!host.is_component_disabled("com.netflix.ninja"));
    }
}
