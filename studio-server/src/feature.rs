//! Image generation feature gate.

use crate::error::{Error, Result};

/// Environment toggle for the image generation endpoints.
pub const FEATURE_ENV_VAR: &str = "FEATURE2_ENABLED";

/// Capability flag resolved once at startup and carried in [`AppState`](crate::AppState).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureGate {
    enabled: bool,
}

impl FeatureGate {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Resolve from a raw environment value. `"true"` in any case enables the
    /// feature, any other value disables it, and `None` falls back to `default`.
    pub fn resolve(env_value: Option<&str>, default: bool) -> Self {
        let enabled = match env_value {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => default,
        };
        Self { enabled }
    }

    /// Resolve from [`FEATURE_ENV_VAR`].
    pub fn from_env(default: bool) -> Self {
        let value = std::env::var(FEATURE_ENV_VAR).ok();
        Self::resolve(value.as_deref(), default)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fail with [`Error::FeatureDisabled`] carrying `message` when closed.
    pub fn ensure_enabled(&self, message: &str) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(Error::FeatureDisabled(message.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults_when_unset() {
        assert!(FeatureGate::resolve(None, true).is_enabled());
        assert!(!FeatureGate::resolve(None, false).is_enabled());
    }

    #[test]
    fn test_resolve_case_insensitive() {
        assert!(FeatureGate::resolve(Some("TRUE"), false).is_enabled());
        assert!(FeatureGate::resolve(Some("True"), false).is_enabled());
        assert!(!FeatureGate::resolve(Some("false"), true).is_enabled());
        assert!(!FeatureGate::resolve(Some("1"), true).is_enabled());
        assert!(!FeatureGate::resolve(Some(""), true).is_enabled());
    }

    #[test]
    fn test_ensure_enabled() {
        assert!(FeatureGate::new(true).ensure_enabled("off").is_ok());
        let err = FeatureGate::new(false).ensure_enabled("off").unwrap_err();
        assert!(matches!(err, Error::FeatureDisabled(ref m) if m == "off"));
    }
}
