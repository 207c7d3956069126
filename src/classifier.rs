//! Input classifier — admission control for raw key events
//!
//! Allow-list semantics: navigation classes always pass, vendor keys on the
//! block-list are suppressed with a re-assertion, and every other key is
//! denied by default. Remotes expose vendor keys whose codes cannot be
//! known in advance, so only known-safe navigation is guaranteed delivery.

use crate::policy::LockdownPolicy;
use crate::reasserter::ReassertSignal;
use crate::types::{
    Disposition, InterceptKind, InterceptedEvent, KeyAction, KeyPressEvent, KioskNotification,
    ReassertReason,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Default number of key codes the ledger tracks before evicting
const DEFAULT_LEDGER_CAPACITY: usize = 256;

/// Last accepted press time per key code, for flood de-duplication
///
/// Entries are advisory and may be evicted at any time.
pub struct KeyPressLedger {
    entries: Mutex<HashMap<i32, u64>>,
    capacity: usize,
}

impl KeyPressLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record a press at `now_ms` unless one was accepted within `cooldown_ms`
    ///
    /// Returns `true` if the ledger timestamp changed.
    pub fn try_accept(&self, key_code: i32, now_ms: u64, cooldown_ms: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(&last) = entries.get(&key_code) {
            if now_ms.saturating_sub(last) < cooldown_ms {
                return false;
            }
        } else if entries.len() >= self.capacity {
            entries.retain(|_, last| now_ms.saturating_sub(*last) < cooldown_ms);
            if entries.len() >= self.capacity {
                entries.clear();
            }
        }

        entries.insert(key_code, now_ms);
        true
    }

    pub fn last_accepted(&self, key_code: i32) -> Option<u64> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key_code)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeyPressLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

/// Classifies key events against the lockdown policy
pub struct InputClassifier {
    policy: Arc<LockdownPolicy>,
    ledger: KeyPressLedger,
    signal: ReassertSignal,
    notifications: broadcast::Sender<KioskNotification>,
}

impl InputClassifier {
    pub fn new(
        policy: Arc<LockdownPolicy>,
        signal: ReassertSignal,
        notifications: broadcast::Sender<KioskNotification>,
    ) -> Self {
        Self {
            policy,
            ledger: KeyPressLedger::default(),
            signal,
            notifications,
        }
    }

    /// Decide whether a key event reaches the hosted application
    ///
    /// Only `Down` events cause side effects, so one physical press fires
    /// at most one re-assertion.
    pub fn classify(&self, event: &KeyPressEvent) -> Disposition {
        if self.policy.is_allowed_input(event.input_class) {
            return Disposition::Passthrough;
        }

        if self
            .policy
            .matches_blocked_key(event.key_code, event.scan_code)
        {
            if event.action == KeyAction::Down {
                tracing::info!(
                    key_code = event.key_code,
                    scan_code = event.scan_code,
                    "Blocked vendor key"
                );
                self.signal.request(ReassertReason::BlockedKey {
                    key_code: event.key_code,
                });
                // No subscribers is fine
                let _ = self
                    .notifications
                    .send(KioskNotification::Intercepted(InterceptedEvent::new(
                        InterceptKind::Key,
                        format!("keyCode={} scanCode={}", event.key_code, event.scan_code),
                    )));
            }
            return Disposition::Suppress;
        }

        if event.action == KeyAction::Down {
            let recorded = self.ledger.try_accept(
                event.key_code,
                event.event_time_ms,
                self.policy.key_cooldown_ms(),
            );
            if recorded {
                tracing::debug!(key_code = event.key_code, "Unrecognized key denied");
            } else {
                tracing::trace!(key_code = event.key_code, "Key flood suppressed");
            }
        }

        Disposition::Suppress
    }

    pub fn ledger(&self) -> &KeyPressLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &LockdownPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::keycode;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn classifier() -> (
        InputClassifier,
        UnboundedReceiver<ReassertReason>,
        broadcast::Receiver<KioskNotification>,
    ) {
        let (signal, rx) = ReassertSignal::channel();
        let (tx, notes) = broadcast::channel(16);
        let classifier = InputClassifier::new(Arc::new(LockdownPolicy::default()), signal, tx);
        (classifier, rx, notes)
    }

    fn drain(rx: &mut UnboundedReceiver<ReassertReason>) -> Vec<ReassertReason> {
        let mut out = Vec::new();
        while let Ok(reason) = rx.try_recv() {
            out.push(reason);
        }
        out
    }

    #[test]
    fn test_navigation_passes_through() {
        let (classifier, mut rx, _notes) = classifier();
        for code in [
            keycode::DPAD_UP,
            keycode::DPAD_DOWN,
            keycode::DPAD_LEFT,
            keycode::DPAD_RIGHT,
            keycode::DPAD_CENTER,
            keycode::ENTER,
            keycode::BACK,
        ] {
            assert_eq!(
                classifier.classify(&KeyPressEvent::down(code, 0, 10)),
                Disposition::Passthrough
            );
            assert_eq!(
                classifier.classify(&KeyPressEvent::up(code, 0, 11)),
                Disposition::Passthrough
            );
        }
        assert!(drain(&mut rx).is_empty());
        assert!(classifier.ledger().is_empty());
    }

    #[test]
    fn test_navigation_never_starved_by_flood() {
        let (classifier, _rx, _notes) = classifier();
        for t in 0..50 {
            classifier.classify(&KeyPressEvent::down(999, 0, t));
            assert_eq!(
                classifier.classify(&KeyPressEvent::down(keycode::DPAD_DOWN, 0, t)),
                Disposition::Passthrough
            );
        }
    }

    #[test]
    fn test_blocked_key_reasserts_once_per_press() {
        let (classifier, mut rx, mut notes) = classifier();

        assert_eq!(
            classifier.classify(&KeyPressEvent::down(227, 0, 100)),
            Disposition::Suppress
        );
        assert_eq!(
            classifier.classify(&KeyPressEvent::up(227, 0, 150)),
            Disposition::Suppress
        );

        assert_eq!(
            drain(&mut rx),
            vec![ReassertReason::BlockedKey { key_code: 227 }]
        );
        match notes.try_recv().unwrap() {
            KioskNotification::Intercepted(event) => {
                assert_eq!(event.kind, InterceptKind::Key);
                assert_eq!(event.matched_signature, "keyCode=227 scanCode=0");
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn test_blocked_scan_code() {
        let (classifier, mut rx, _notes) = classifier();
        assert_eq!(
            classifier.classify(&KeyPressEvent::down(0, 172, 1)),
            Disposition::Suppress
        );
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(classifier.ledger().is_empty());
    }

    #[test]
    fn test_unrecognized_key_flood_collapses() {
        let (classifier, mut rx, _notes) = classifier();

        for t in [0, 50, 100, 150, 200] {
            assert_eq!(
                classifier.classify(&KeyPressEvent::down(999, 0, 1_000 + t)),
                Disposition::Suppress
            );
        }

        assert_eq!(classifier.ledger().last_accepted(999), Some(1_000));
        assert_eq!(classifier.ledger().len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_unrecognized_key_after_cooldown_updates_ledger() {
        let (classifier, _rx, _notes) = classifier();
        classifier.classify(&KeyPressEvent::down(999, 0, 1_000));
        classifier.classify(&KeyPressEvent::down(999, 0, 2_000));
        assert_eq!(classifier.ledger().last_accepted(999), Some(2_000));
    }

    #[test]
    fn test_home_is_denied() {
        let (classifier, mut rx, _notes) = classifier();
        assert_eq!(
            classifier.classify(&KeyPressEvent::down(keycode::HOME, 0, 5)),
            Disposition::Suppress
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_up_does_not_touch_ledger() {
        let (classifier, _rx, _notes) = classifier();
        classifier.classify(&KeyPressEvent::up(999, 0, 5));
        assert!(classifier.ledger().is_empty());
    }

    #[test]
    fn test_ledger_eviction() {
        let ledger = KeyPressLedger::new(2);
        assert!(ledger.try_accept(1, 0, 100));
        assert!(ledger.try_accept(2, 0, 100));
        // Both entries expired by t=500, so they are pruned
        assert!(ledger.try_accept(3, 500, 100));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.last_accepted(1), None);
    }

    #[test]
    fn test_ledger_full_of_live_entries_clears() {
        let ledger = KeyPressLedger::new(2);
        ledger.try_accept(1, 0, 1_000);
        ledger.try_accept(2, 0, 1_000);
        assert!(ledger.try_accept(3, 10, 1_000));
        assert_eq!(ledger.len(), 1);
    }
}
