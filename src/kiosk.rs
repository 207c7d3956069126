//! Kiosk facade — the API the hosted application talks to
//!
//! Wires the classifier, sanitizer, and reasserter around one host and one
//! policy, runs the re-assertion loop, and publishes navigation events and
//! notifications.

use crate::classifier::InputClassifier;
use crate::command::{KioskCommand, KioskReply};
use crate::config::KioskConfig;
use crate::error::Result;
use crate::host::KioskHost;
use crate::policy::LockdownPolicy;
use crate::reasserter::{ReassertSignal, Reasserter};
use crate::sanitizer::{CleanRequest, DeepLinkSanitizer};
use crate::types::{
    Disposition, EnforcementState, InboundIntent, InterceptKind, InterceptedEvent, KeyAction,
    KeyPressEvent, KioskNotification, LifecycleSignal, NavigationEvent, ReassertReason,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

/// Kiosk lockdown engine bound to a host platform
///
/// Thread-safe; share behind an `Arc`. Dropping the kiosk stops its
/// re-assertion loop but does not release the lockdown; call
/// `disable_lockdown()` first for that.
pub struct Kiosk {
    policy: Arc<LockdownPolicy>,
    classifier: InputClassifier,
    sanitizer: DeepLinkSanitizer,
    reasserter: Arc<Reasserter>,
    signal: ReassertSignal,
    notifications: broadcast::Sender<KioskNotification>,
    navigation: broadcast::Sender<NavigationEvent>,
    signal_loop: JoinHandle<()>,
}

impl Kiosk {
    /// Create a kiosk and start its re-assertion loop
    ///
    /// Must be called from within a Tokio runtime. Lockdown starts
    /// `Disabled`; call `enable_lockdown()` or deliver `Created`.
    pub fn new(host: Arc<dyn KioskHost>, config: KioskConfig) -> Result<Self> {
        config.validate()?;

        let policy = Arc::new(config.policy.clone());
        let (notifications, _) = broadcast::channel(config.notification_capacity);
        let (navigation, _) = broadcast::channel(config.notification_capacity);
        let (signal, signals) = ReassertSignal::channel();

        let reasserter = Arc::new(Reasserter::new(
            Arc::clone(&host),
            Arc::clone(&policy),
            config.pinning_timeout(),
            signal.clone(),
            notifications.clone(),
        ));
        let signal_loop = tokio::spawn(run_signal_loop(Arc::clone(&reasserter), signals));

        tracing::info!(host = host.name(), "Kiosk created");

        Ok(Self {
            classifier: InputClassifier::new(
                Arc::clone(&policy),
                signal.clone(),
                notifications.clone(),
            ),
            sanitizer: DeepLinkSanitizer::new(Arc::clone(&policy)),
            policy,
            reasserter,
            signal,
            notifications,
            navigation,
            signal_loop,
        })
    }

    pub async fn enable_lockdown(&self) -> EnforcementState {
        self.reasserter.enable().await
    }

    pub async fn disable_lockdown(&self) -> EnforcementState {
        self.reasserter.disable().await
    }

    pub async fn force_fallback_mode(&self) -> EnforcementState {
        self.reasserter.promote_to_fallback().await
    }

    pub fn is_in_fallback_mode(&self) -> bool {
        self.reasserter.is_in_fallback_mode()
    }

    pub fn state(&self) -> EnforcementState {
        self.reasserter.state()
    }

    /// Execute a bridge command
    pub async fn execute(&self, command: KioskCommand) -> KioskReply {
        tracing::debug!(command = %command, "Executing command");
        match command {
            KioskCommand::EnableLockdown => {
                self.enable_lockdown().await;
                KioskReply::Ack
            }
            KioskCommand::DisableLockdown => {
                self.disable_lockdown().await;
                KioskReply::Ack
            }
            KioskCommand::ForceFallbackMode => {
                self.force_fallback_mode().await;
                KioskReply::Ack
            }
            KioskCommand::IsInFallbackMode => KioskReply::FallbackMode(self.is_in_fallback_mode()),
        }
    }

    /// Parse and execute a bridge payload such as `{"method": "enableLockdown"}`
    pub async fn execute_json(&self, json: &str) -> Result<KioskReply> {
        let command = KioskCommand::from_json(json)?;
        Ok(self.execute(command).await)
    }

    /// Route a lifecycle callback from the host
    pub async fn on_lifecycle(&self, signal: LifecycleSignal) {
        tracing::debug!(signal = ?signal, "Lifecycle signal");
        match signal {
            LifecycleSignal::Created => {
                self.reasserter.enable().await;
            }
            LifecycleSignal::FocusChanged(true) | LifecycleSignal::Resumed => {
                self.reasserter.reassert().await;
            }
            LifecycleSignal::FocusChanged(false) => {}
            LifecycleSignal::Paused => self.reasserter.bring_to_front().await,
            LifecycleSignal::Destroyed => {
                self.reasserter.disable().await;
            }
        }
    }

    /// Classify a raw key event from the input dispatch point
    ///
    /// While lockdown is disabled every key passes. Passthrough key-downs
    /// with a navigation meaning are published on the navigation stream.
    pub fn dispatch_key(&self, event: &KeyPressEvent) -> Disposition {
        let disposition = if self.state() == EnforcementState::Disabled {
            Disposition::Passthrough
        } else {
            self.classifier.classify(event)
        };

        if disposition == Disposition::Passthrough && event.action == KeyAction::Down {
            if let Some(nav) = event.input_class.navigation() {
                let _ = self.navigation.send(nav);
            }
        }
        disposition
    }

    /// Inspect an inbound deep link addressed to the hosted application
    ///
    /// Sanitization is armed only in fallback mode; pinning already keeps
    /// external destinations from taking the foreground. A blocked link
    /// schedules a re-assertion so system chrome is hidden again.
    pub fn handle_deep_link(&self, request_uri: &str) -> Option<CleanRequest> {
        if !self.reasserter.deep_link_sanitizer_armed() {
            return Some(CleanRequest::unchecked(request_uri));
        }

        let clean = self.sanitizer.sanitize(request_uri);
        if clean.is_none() {
            self.notify_deep_link_blocked(request_uri);
        }
        clean
    }

    /// Sanitize a full inbound intent, substituting a neutral one if blocked
    pub fn handle_inbound_intent(&self, intent: InboundIntent) -> InboundIntent {
        if !self.reasserter.deep_link_sanitizer_armed() {
            return intent;
        }
        if self.sanitizer.blocks_intent(&intent) {
            if let Some(uri) = intent.data.as_deref() {
                self.notify_deep_link_blocked(uri);
            }
        }
        self.sanitizer.sanitize_intent(intent)
    }

    /// Drop activity results that would hand off to an external destination
    pub fn filter_activity_result(&self, result: Option<InboundIntent>) -> Option<InboundIntent> {
        if !self.reasserter.deep_link_sanitizer_armed() {
            return result;
        }
        self.sanitizer.filter_activity_result(result)
    }

    /// Navigation events for passthrough key-downs
    pub fn navigation_stream(&self) -> impl Stream<Item = NavigationEvent> + Send + 'static {
        BroadcastStream::new(self.navigation.subscribe()).filter_map(|event| event.ok())
    }

    pub fn subscribe_navigation(&self) -> broadcast::Receiver<NavigationEvent> {
        self.navigation.subscribe()
    }

    /// Fallback-mode changes, interceptions, and completed re-assertions
    pub fn subscribe(&self) -> broadcast::Receiver<KioskNotification> {
        self.notifications.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<EnforcementState> {
        self.reasserter.subscribe_state()
    }

    pub fn policy(&self) -> &LockdownPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &InputClassifier {
        &self.classifier
    }

    pub fn reasserter(&self) -> &Reasserter {
        &self.reasserter
    }

    fn notify_deep_link_blocked(&self, uri: &str) {
        self.signal.request(ReassertReason::BlockedDeepLink);
        let fragment = self
            .policy
            .matches_external_destination(uri)
            .unwrap_or_default();
        let _ = self
            .notifications
            .send(KioskNotification::Intercepted(InterceptedEvent::new(
                InterceptKind::DeepLink,
                format!("destination~{}", fragment),
            )));
    }
}

impl Drop for Kiosk {
    fn drop(&mut self) {
        self.signal_loop.abort();
    }
}

async fn run_signal_loop(
    reasserter: Arc<Reasserter>,
    mut signals: mpsc::UnboundedReceiver<ReassertReason>,
) {
    while let Some(reason) = signals.recv().await {
        reasserter.handle_signal(reason).await;
    }
    tracing::debug!("Re-assertion loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use crate::types::keycode;

    fn kiosk(host: MemoryHost) -> (Arc<MemoryHost>, Kiosk) {
        let host = Arc::new(host);
        let kiosk = Kiosk::new(host.clone(), KioskConfig::default()).unwrap();
        (host, kiosk)
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = KioskConfig {
            notification_capacity: 0,
            ..Default::default()
        };
        assert!(Kiosk::new(Arc::new(MemoryHost::default()), config).is_err());
    }

    #[tokio::test]
    async fn test_disabled_kiosk_passes_all_keys() {
        let (_host, kiosk) = kiosk(MemoryHost::default());
        assert_eq!(
            kiosk.dispatch_key(&KeyPressEvent::down(227, 0, 1)),
            Disposition::Passthrough
        );
    }

    #[tokio::test]
    async fn test_navigation_published_on_down_only() {
        let (_host, kiosk) = kiosk(MemoryHost::default());
        kiosk.enable_lockdown().await;
        let mut nav = kiosk.subscribe_navigation();

        kiosk.dispatch_key(&KeyPressEvent::down(keycode::DPAD_LEFT, 0, 1));
        kiosk.dispatch_key(&KeyPressEvent::up(keycode::DPAD_LEFT, 0, 2));
        kiosk.dispatch_key(&KeyPressEvent::down(999, 0, 3));

        assert_eq!(nav.try_recv().unwrap(), NavigationEvent::Left);
        assert!(nav.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_execute_commands() {
        let (_host, kiosk) = kiosk(MemoryHost::default());
        assert_eq!(kiosk.execute(KioskCommand::EnableLockdown).await, KioskReply::Ack);
        assert_eq!(
            kiosk.execute(KioskCommand::IsInFallbackMode).await,
            KioskReply::FallbackMode(false)
        );
        kiosk.execute(KioskCommand::ForceFallbackMode).await;
        assert_eq!(
            kiosk.execute(KioskCommand::IsInFallbackMode).await,
            KioskReply::FallbackMode(true)
        );
        kiosk.execute(KioskCommand::DisableLockdown).await;
        assert_eq!(kiosk.state(), EnforcementState::Disabled);
    }

    #[tokio::test]
    async fn test_execute_json_unknown_method() {
        let (_host, kiosk) = kiosk(MemoryHost::default());
        let err = kiosk
            .execute_json(r#"{"method": "getEthernetIp"}"#)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_deep_links_pass_while_pinned() {
        let (_host, kiosk) = kiosk(MemoryHost::default());
        kiosk.enable_lockdown().await;
        let link = "https://example.com/open?target=youtube";
        assert_eq!(kiosk.handle_deep_link(link).unwrap().as_str(), link);
    }

    #[tokio::test]
    async fn test_deep_links_sanitized_in_fallback() {
        let (_host, kiosk) = kiosk(MemoryHost::without_pinning());
        kiosk.enable_lockdown().await;
        let mut notes = kiosk.subscribe();

        assert!(kiosk
            .handle_deep_link("https://example.com/open?target=youtube")
            .is_none());
        assert_eq!(
            kiosk.handle_deep_link("app://hosted/play?id=42").unwrap().as_str(),
            "app://hosted/play?id=42"
        );

        match notes.try_recv().unwrap() {
            KioskNotification::Intercepted(e) => {
                assert_eq!(e.kind, InterceptKind::DeepLink);
                assert_eq!(e.matched_signature, "destination~youtube");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inbound_intent_neutralized_in_fallback() {
        let (_host, kiosk) = kiosk(MemoryHost::without_pinning());
        kiosk.enable_lockdown().await;

        let cleaned = kiosk.handle_inbound_intent(InboundIntent::view("netflix://title/1"));
        assert_eq!(cleaned, InboundIntent::neutral());
        assert_eq!(
            kiosk.filter_activity_result(Some(InboundIntent::view("https://disneyplus.com"))),
            None
        );
    }

    #[tokio::test]
    async fn test_lifecycle_routing() {
        let (host, kiosk) = kiosk(MemoryHost::default());

        kiosk.on_lifecycle(LifecycleSignal::Created).await;
        assert_eq!(kiosk.state(), EnforcementState::PinningActive);

        kiosk.on_lifecycle(LifecycleSignal::Paused).await;
        assert_eq!(host.bring_to_front_calls(), 1);
        assert_eq!(kiosk.state(), EnforcementState::PinningActive);

        host.revoke_pinning();
        kiosk.on_lifecycle(LifecycleSignal::Resumed).await;
        assert!(host.pinned());

        kiosk.on_lifecycle(LifecycleSignal::Destroyed).await;
        assert_eq!(kiosk.state(), EnforcementState::Disabled);
        assert!(!host.pinned());
    }
}
