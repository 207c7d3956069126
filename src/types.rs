//! Core event types for the a3s-kiosk engine
//!
//! All serializable types use camelCase JSON for bridge compatibility.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Android key codes the default classifier recognizes
pub mod keycode {
    pub const HOME: i32 = 3;
    pub const BACK: i32 = 4;
    pub const DPAD_UP: i32 = 19;
    pub const DPAD_DOWN: i32 = 20;
    pub const DPAD_LEFT: i32 = 21;
    pub const DPAD_RIGHT: i32 = 22;
    pub const DPAD_CENTER: i32 = 23;
    pub const ENTER: i32 = 66;
}

/// Class of a raw input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputClass {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    Home,
    /// Any code without a known meaning (vendor keys, media keys, ...)
    Unrecognized,
}

impl InputClass {
    /// Classify a raw Android key code
    pub fn from_key_code(key_code: i32) -> Self {
        match key_code {
            keycode::DPAD_UP => InputClass::Up,
            keycode::DPAD_DOWN => InputClass::Down,
            keycode::DPAD_LEFT => InputClass::Left,
            keycode::DPAD_RIGHT => InputClass::Right,
            keycode::DPAD_CENTER | keycode::ENTER => InputClass::Select,
            keycode::BACK => InputClass::Back,
            keycode::HOME => InputClass::Home,
            _ => InputClass::Unrecognized,
        }
    }

    /// The navigation event delivered to the hosted application, if any
    pub fn navigation(self) -> Option<NavigationEvent> {
        match self {
            InputClass::Up => Some(NavigationEvent::Up),
            InputClass::Down => Some(NavigationEvent::Down),
            InputClass::Left => Some(NavigationEvent::Left),
            InputClass::Right => Some(NavigationEvent::Right),
            InputClass::Select => Some(NavigationEvent::Select),
            InputClass::Back => Some(NavigationEvent::Back),
            InputClass::Home | InputClass::Unrecognized => None,
        }
    }
}

/// Press direction of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyAction {
    Down,
    Up,
}

/// A raw key event taken from the input dispatch point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPressEvent {
    pub key_code: i32,
    pub scan_code: i32,
    pub action: KeyAction,
    pub input_class: InputClass,
    /// Host event time in milliseconds (monotonic within a session)
    pub event_time_ms: u64,
}

impl KeyPressEvent {
    /// Create an event, deriving the input class from the key code
    pub fn new(key_code: i32, scan_code: i32, action: KeyAction, event_time_ms: u64) -> Self {
        Self {
            key_code,
            scan_code,
            action,
            input_class: InputClass::from_key_code(key_code),
            event_time_ms,
        }
    }

    pub fn down(key_code: i32, scan_code: i32, event_time_ms: u64) -> Self {
        Self::new(key_code, scan_code, KeyAction::Down, event_time_ms)
    }

    pub fn up(key_code: i32, scan_code: i32, event_time_ms: u64) -> Self {
        Self::new(key_code, scan_code, KeyAction::Up, event_time_ms)
    }
}

/// Input classifier verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Deliver to the hosted application
    Passthrough,
    /// Consume the event
    Suppress,
}

/// Directional navigation delivered to the hosted application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationEvent {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
}

/// A system-wide notification announcing intent to start another application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchEvent {
    /// Launch action (e.g., "android.intent.action.VIEW")
    pub action: String,

    /// Data URI scheme, if the launch carries data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_scheme: Option<String>,

    /// Full data string, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Target package, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Launch categories
    #[serde(default)]
    pub categories: Vec<String>,
}

impl LaunchEvent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Attach a data URI; the scheme is derived from it
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        let data = data.into();
        self.data_scheme = data.split_once(':').map(|(scheme, _)| scheme.to_string());
        self.data = Some(data);
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.data_scheme = Some(scheme.into());
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }
}

/// Launch interceptor verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptDecision {
    /// Abort further propagation of the broadcast
    Veto,
    /// Let the broadcast continue
    Allow,
}

/// Enforcement mode of the kiosk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnforcementState {
    #[default]
    Disabled,
    PinningActive,
    FallbackActive,
}

/// What kind of event an interception concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterceptKind {
    Launch,
    DeepLink,
    Key,
}

/// Record of a suppressed event, for observability only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedEvent {
    pub kind: InterceptKind,
    /// Human-readable description of the matching signature
    pub matched_signature: String,
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

impl InterceptedEvent {
    pub fn new(kind: InterceptKind, matched_signature: impl Into<String>) -> Self {
        Self {
            kind,
            matched_signature: matched_signature.into(),
            timestamp: now_millis(),
        }
    }
}

/// Why a foreground re-assertion was scheduled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ReassertReason {
    /// A blocked vendor key was pressed
    #[serde(rename_all = "camelCase")]
    BlockedKey { key_code: i32 },
    /// A launch broadcast was vetoed
    VetoedLaunch,
    /// The system reported a home/recents dialog dismissal
    SystemDialog { reason: String },
    /// An inbound deep link to an external destination was neutralized
    BlockedDeepLink,
}

/// Notifications published to the hosted application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskNotification {
    /// Fallback mode was entered (`true`) or left (`false`)
    FallbackModeChanged(bool),
    /// An event was suppressed
    Intercepted(InterceptedEvent),
    /// A scheduled re-assertion completed
    Reasserted(ReassertReason),
}

/// Host-controlled lifecycle callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    Created,
    FocusChanged(bool),
    Resumed,
    Paused,
    Destroyed,
}

/// An inbound navigation request addressed to the hosted application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundIntent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default)]
    pub extras: HashMap<String, String>,
}

/// Action name of a view intent
pub const ACTION_VIEW: &str = "android.intent.action.VIEW";

/// Action name of a main/launcher intent
pub const ACTION_MAIN: &str = "android.intent.action.MAIN";

impl InboundIntent {
    pub fn view(data: impl Into<String>) -> Self {
        Self {
            action: Some(ACTION_VIEW.to_string()),
            data: Some(data.into()),
            extras: HashMap::new(),
        }
    }

    /// A main intent with no data and no extras
    pub fn neutral() -> Self {
        Self {
            action: Some(ACTION_MAIN.to_string()),
            data: None,
            extras: HashMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn is_view(&self) -> bool {
        self.action.as_deref() == Some(ACTION_VIEW)
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
