use crate::descriptor::CapabilityDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::debug;

/// Global credential settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// `false` opens every restricted operation.
    pub enabled: bool,
    /// Key for restricted operations without their own key. `None` or an
    /// empty key denies them.
    pub api_key: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            enabled: true,
            api_key: None,
        }
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Outcome of [`AuthGate::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny,
}

impl AuthDecision {
    pub fn is_allowed(self) -> bool {
        self == AuthDecision::Allow
    }
}

/// Decides whether a caller may invoke a capability.
///
/// Stateless after construction; one gate is shared by every transport.
#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    config: SecurityConfig,
}

impl AuthGate {
    pub fn new(config: SecurityConfig) -> Self {
        AuthGate { config }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// First matching rule wins: public operations and open mode allow, a
    /// per-operation key is checked on its own, otherwise the global key.
    /// An absent global key denies.
    pub fn validate(&self, descriptor: &CapabilityDescriptor, supplied: Option<&str>) -> AuthDecision {
        if !descriptor.is_restricted() {
            return AuthDecision::Allow;
        }
        if !self.config.enabled {
            debug!(capability = %descriptor.qualified_name(), "Security disabled, allowing restricted call");
            return AuthDecision::Allow;
        }

        let expected = match descriptor.api_key().filter(|key| !key.is_empty()) {
            Some(override_key) => Some(override_key),
            None => self.config.api_key.as_deref().filter(|key| !key.is_empty()),
        };

        match (expected, supplied) {
            (Some(expected), Some(supplied)) if keys_match(expected, supplied) => AuthDecision::Allow,
            _ => AuthDecision::Deny,
        }
    }

    /// What kind of credential the operation wants. Never contains a key.
    pub fn hint(&self, descriptor: &CapabilityDescriptor) -> &'static str {
        if !descriptor.is_restricted() {
            "No key required (public method)"
        } else if descriptor.api_key().is_some_and(|key| !key.is_empty()) {
            "Method-specific key required"
        } else {
            "Global API key required"
        }
    }
}

fn keys_match(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}
