//! # a3s-kiosk
//!
//! Kiosk lockdown enforcement for shared-use devices.
//!
//! ## Overview
//!
//! `a3s-kiosk` keeps a single hosted application in exclusive control of
//! the foreground. It decides which input and launch events reach the
//! application, vetoes escapes to other applications, and re-asserts the
//! lockdown on every lifecycle transition. When the platform's native
//! pinning is unavailable it degrades to manual interception.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_kiosk::{Kiosk, KioskConfig, KeyPressEvent, Disposition, EnforcementState};
//! use a3s_kiosk::host::memory::MemoryHost;
//! use std::sync::Arc;
//!
//! # async fn example() -> a3s_kiosk::Result<()> {
//! let host = Arc::new(MemoryHost::default());
//! let kiosk = Kiosk::new(host, KioskConfig::default())?;
//!
//! assert_eq!(kiosk.enable_lockdown().await, EnforcementState::PinningActive);
//!
//! // D-pad up passes, a vendor streaming key does not
//! assert_eq!(kiosk.dispatch_key(&KeyPressEvent::down(19, 103, 0)), Disposition::Passthrough);
//! assert_eq!(kiosk.dispatch_key(&KeyPressEvent::down(227, 0, 0)), Disposition::Suppress);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **LockdownPolicy** — immutable allow-list and block-lists shared by all components
//! - **KioskHost** trait — platform capabilities (pinning, chrome, broadcasts)
//! - **PinningController** — bounded requests for exclusive-foreground status
//! - **InputClassifier** — allow-list admission with flood de-duplication
//! - **LaunchInterceptor** — first-refusal veto on launch broadcasts
//! - **DeepLinkSanitizer** — neutralizes deep links to external destinations
//! - **Reasserter** — the `Disabled → PinningActive → FallbackActive` state machine
//! - **Kiosk** — facade wiring it all to one host

pub mod classifier;
pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod interceptor;
pub mod kiosk;
pub mod pinning;
pub mod policy;
pub mod reasserter;
pub mod sanitizer;
pub mod types;

// Re-export core types
pub use classifier::{InputClassifier, KeyPressLedger};
pub use command::{KioskCommand, KioskReply};
pub use config::KioskConfig;
pub use error::{KioskError, Result};
pub use host::{Broadcast, BroadcastReceiver, KioskHost, ReceiverKind, RegistrationHandle};
pub use interceptor::{LaunchInterceptor, SystemDialogWatcher, LAUNCH_INTERCEPT_PRIORITY};
pub use kiosk::Kiosk;
pub use pinning::{Pinned, PinningController};
pub use policy::{KeySignature, LaunchSignature, LockdownPolicy, LockdownPolicyBuilder};
pub use reasserter::{InterceptorRegistration, ReassertSignal, Reasserter};
pub use sanitizer::{CleanRequest, DeepLinkSanitizer};
pub use types::{
    Disposition, EnforcementState, InboundIntent, InputClass, InterceptDecision, InterceptKind,
    InterceptedEvent, KeyAction, KeyPressEvent, KioskNotification, LaunchEvent, LifecycleSignal,
    NavigationEvent, ReassertReason,
};

// Re-export the in-memory host for convenience
pub use host::memory::{MemoryHost, MemoryHostConfig};
