//! Deep-link sanitizer for inbound navigation requests
//!
//! Matching is substring based against the policy's external destination
//! fragments. Remotes pass free-form deep-link strings, so partial matches
//! anywhere in the URI count.

use crate::policy::LockdownPolicy;
use crate::types::InboundIntent;
use std::sync::Arc;

/// A deep link that passed sanitization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRequest {
    uri: String,
}

impl CleanRequest {
    pub(crate) fn unchecked(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn into_inner(self) -> String {
        self.uri
    }
}

/// Neutralizes inbound requests that point at external destinations
pub struct DeepLinkSanitizer {
    policy: Arc<LockdownPolicy>,
}

impl DeepLinkSanitizer {
    pub fn new(policy: Arc<LockdownPolicy>) -> Self {
        Self { policy }
    }

    /// Returns `None` if the URI targets a known external destination
    pub fn sanitize(&self, request_uri: &str) -> Option<CleanRequest> {
        if let Some(fragment) = self.policy.matches_external_destination(request_uri) {
            tracing::info!(uri = %request_uri, fragment = %fragment, "Blocked deep link");
            return None;
        }
        Some(CleanRequest::unchecked(request_uri))
    }

    /// Whether an intent is a view intent whose data targets an external destination
    pub fn blocks_intent(&self, intent: &InboundIntent) -> bool {
        intent.is_view()
            && matches!(intent.data.as_deref(), Some(data) if self.sanitize(data).is_none())
    }

    /// Replace a blocked view intent with a neutral main intent
    ///
    /// Only view intents carrying data are inspected.
    pub fn sanitize_intent(&self, intent: InboundIntent) -> InboundIntent {
        if self.blocks_intent(&intent) {
            InboundIntent::neutral()
        } else {
            intent
        }
    }

    /// Drop an activity result whose payload targets an external destination
    pub fn filter_activity_result(&self, result: Option<InboundIntent>) -> Option<InboundIntent> {
        result.filter(|intent| !self.blocks_intent(intent))
    }
}
