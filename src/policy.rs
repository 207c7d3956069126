//! Lockdown policy — the allow-list and block-lists every component reads
//!
//! A `LockdownPolicy` is immutable once built. Components share it through
//! an `Arc` and read it without locking. All matching here is pure; the
//! actions taken on a positive match live in the components.

use crate::error::{KioskError, Result};
use crate::types::{InputClass, LaunchEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Pattern identifying a class of launch events to block
///
/// `None` fields are wildcards. All string comparisons ignore ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSignature {
    /// Full action string, or its final dot-separated segment ("VIEW")
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_scheme: Option<String>,

    /// Substring the target package must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_hint: Option<String>,

    /// Category the launch must carry (full name or final segment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl LaunchSignature {
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            data_scheme: None,
            package_hint: None,
            category: None,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.data_scheme = Some(scheme.into());
        self
    }

    pub fn with_package_hint(mut self, hint: impl Into<String>) -> Self {
        self.package_hint = Some(hint.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Check whether a launch event carries this signature
    pub fn matches(&self, event: &LaunchEvent) -> bool {
        if !name_matches(&event.action, &self.action) {
            return false;
        }

        if let Some(ref scheme) = self.data_scheme {
            match event.data_scheme {
                Some(ref s) if s.eq_ignore_ascii_case(scheme) => {}
                _ => return false,
            }
        }

        if let Some(ref hint) = self.package_hint {
            let hint = hint.to_ascii_lowercase();
            match event.package {
                Some(ref p) if p.to_ascii_lowercase().contains(&hint) => {}
                _ => return false,
            }
        }

        if let Some(ref category) = self.category {
            if !event.categories.iter().any(|c| name_matches(c, category)) {
                return false;
            }
        }

        true
    }
}

impl fmt::Display for LaunchSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action={}", self.action)?;
        if let Some(ref scheme) = self.data_scheme {
            write!(f, " scheme={}", scheme)?;
        }
        if let Some(ref hint) = self.package_hint {
            write!(f, " package~{}", hint)?;
        }
        if let Some(ref category) = self.category {
            write!(f, " category={}", category)?;
        }
        Ok(())
    }
}

/// `candidate` equals `pattern`, or its last dot-separated segment does
fn name_matches(candidate: &str, pattern: &str) -> bool {
    if candidate.eq_ignore_ascii_case(pattern) {
        return true;
    }
    candidate
        .rsplit('.')
        .next()
        .map(|tail| tail.eq_ignore_ascii_case(pattern))
        .unwrap_or(false)
}

/// Pattern identifying a vendor key to block
///
/// A signature with only a key code matches any scan code and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySignature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_code: Option<i32>,
}

impl KeySignature {
    pub fn key(key_code: i32) -> Self {
        Self {
            key_code: Some(key_code),
            scan_code: None,
        }
    }

    pub fn scan(scan_code: i32) -> Self {
        Self {
            key_code: None,
            scan_code: Some(scan_code),
        }
    }

    pub fn exact(key_code: i32, scan_code: i32) -> Self {
        Self {
            key_code: Some(key_code),
            scan_code: Some(scan_code),
        }
    }

    pub fn matches(&self, key_code: i32, scan_code: i32) -> bool {
        if self.key_code.is_none() && self.scan_code.is_none() {
            return false;
        }
        self.key_code.map_or(true, |k| k == key_code)
            && self.scan_code.map_or(true, |s| s == scan_code)
    }
}

/// Read-only lockdown configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockdownPolicy {
    allowed_input_classes: HashSet<InputClass>,
    blocked_launch_signatures: Vec<LaunchSignature>,
    blocked_key_signatures: HashSet<KeySignature>,
    key_cooldown_ms: u64,
    external_destinations: Vec<String>,
    blocked_packages: Vec<String>,
}

impl Default for LockdownPolicy {
    /// The television-remote policy: directional navigation only, the
    /// common streaming-service keys and launches blocked
    fn default() -> Self {
        Self {
            allowed_input_classes: [
                InputClass::Up,
                InputClass::Down,
                InputClass::Left,
                InputClass::Right,
                InputClass::Select,
                InputClass::Back,
            ]
            .into_iter()
            .collect(),
            blocked_launch_signatures: vec![
                LaunchSignature::action("VIEW").with_scheme("netflix"),
                LaunchSignature::action("VIEW").with_scheme("youtube"),
                LaunchSignature::action("VIEW").with_scheme("vnd.youtube"),
                LaunchSignature::action("com.netflix.action.NETFLIX"),
                LaunchSignature::action("MAIN").with_category("LAUNCHER"),
                LaunchSignature::action("MAIN").with_category("LEANBACK_LAUNCHER"),
            ],
            blocked_key_signatures: [225, 227, 228, 229, 4062]
                .into_iter()
                .map(KeySignature::key)
                .chain(
                    [164, 165, 170, 172, 173, 236, 566]
                        .into_iter()
                        .map(KeySignature::scan),
                )
                .collect(),
            key_cooldown_ms: 1000,
            external_destinations: ["netflix", "youtube", "amazon", "prime", "disney"]
                .into_iter()
                .map(String::from)
                .collect(),
            blocked_packages: [
                "com.netflix.ninja",
                "com.netflix.mediaclient",
                "com.google.android.youtube.tv",
                "com.amazon.amazonvideo.livingroom",
                "com.disney.disneyplus",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl LockdownPolicy {
    /// Start building a policy from an empty one
    pub fn builder() -> LockdownPolicyBuilder {
        LockdownPolicyBuilder::default()
    }

    /// Parse a policy from JSON; missing fields take their default values
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: LockdownPolicy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn is_allowed_input(&self, class: InputClass) -> bool {
        self.allowed_input_classes.contains(&class)
    }

    /// First blocked launch signature the event carries, in declaration order
    pub fn matches_blocked_launch(&self, event: &LaunchEvent) -> Option<&LaunchSignature> {
        self.blocked_launch_signatures
            .iter()
            .find(|sig| sig.matches(event))
    }

    pub fn matches_blocked_key(&self, key_code: i32, scan_code: i32) -> bool {
        self.blocked_key_signatures
            .iter()
            .any(|sig| sig.matches(key_code, scan_code))
    }

    /// First external destination fragment contained in `uri`, ignoring case
    pub fn matches_external_destination(&self, uri: &str) -> Option<&str> {
        let uri = uri.to_ascii_lowercase();
        self.external_destinations
            .iter()
            .find(|fragment| uri.contains(&fragment.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn key_cooldown(&self) -> Duration {
        Duration::from_millis(self.key_cooldown_ms)
    }

    pub fn key_cooldown_ms(&self) -> u64 {
        self.key_cooldown_ms
    }

    pub fn blocked_packages(&self) -> &[String] {
        &self.blocked_packages
    }

    pub fn blocked_launch_signatures(&self) -> &[LaunchSignature] {
        &self.blocked_launch_signatures
    }

    /// Reject policies that would lock out navigation or never match
    pub fn validate(&self) -> Result<()> {
        if self.allowed_input_classes.is_empty() {
            return Err(KioskError::Config(
                "Policy must allow at least one input class".to_string(),
            ));
        }
        if self.key_cooldown_ms == 0 {
            return Err(KioskError::Config(
                "Key cooldown must be greater than zero".to_string(),
            ));
        }
        if let Some(sig) = self
            .blocked_launch_signatures
            .iter()
            .find(|sig| sig.action.trim().is_empty())
        {
            return Err(KioskError::Config(format!(
                "Launch signature has an empty action: {}",
                sig
            )));
        }
        if self
            .blocked_key_signatures
            .iter()
            .any(|sig| sig.key_code.is_none() && sig.scan_code.is_none())
        {
            return Err(KioskError::Config(
                "Key signature needs a key code or a scan code".to_string(),
            ));
        }
        // An allowed navigation key that is also blocked would be silently
        // unreachable through the block-list.
        if let Some(code) = self
            .blocked_key_signatures
            .iter()
            .filter_map(|sig| sig.key_code)
            .find(|code| self.is_allowed_input(InputClass::from_key_code(*code)))
        {
            return Err(KioskError::Config(format!(
                "Key code {} is both allowed for navigation and blocked",
                code
            )));
        }
        Ok(())
    }
}

/// Builder for custom lockdown policies
#[derive(Debug)]
pub struct LockdownPolicyBuilder {
    policy: LockdownPolicy,
}

impl Default for LockdownPolicyBuilder {
    fn default() -> Self {
        Self {
            policy: LockdownPolicy::default(),
        }
        .clear()
    }
}

impl LockdownPolicyBuilder {
    /// Start from the built-in default policy instead of an empty one
    pub fn from_default() -> Self {
        Self {
            policy: LockdownPolicy::default(),
        }
    }

    /// Remove every list entry, keeping the cooldown
    pub fn clear(mut self) -> Self {
        self.policy.allowed_input_classes.clear();
        self.policy.blocked_launch_signatures.clear();
        self.policy.blocked_key_signatures.clear();
        self.policy.external_destinations.clear();
        self.policy.blocked_packages.clear();
        self
    }

    pub fn allow_input(mut self, class: InputClass) -> Self {
        self.policy.allowed_input_classes.insert(class);
        self
    }

    pub fn block_launch(mut self, signature: LaunchSignature) -> Self {
        self.policy.blocked_launch_signatures.push(signature);
        self
    }

    pub fn block_key(mut self, signature: KeySignature) -> Self {
        self.policy.blocked_key_signatures.insert(signature);
        self
    }

    pub fn key_cooldown(mut self, cooldown: Duration) -> Self {
        self.policy.key_cooldown_ms = u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn external_destination(mut self, fragment: impl Into<String>) -> Self {
        self.policy.external_destinations.push(fragment.into());
        self
    }

    pub fn blocked_package(mut self, package: impl Into<String>) -> Self {
        self.policy.blocked_packages.push(package.into());
        self
    }

    pub fn build(self) -> Result<LockdownPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
