//! View mapper configuration.

use serde::{Deserialize, Serialize};

/// Configuration for how a view mapper presents updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Animate changes with fine-grained batches.
    ///
    /// When disabled every non-empty update is applied as a full reload.
    pub should_animate_updates: bool,

    /// Reload the whole view on resume instead of animating the gap.
    pub reload_on_resume: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            should_animate_updates: true,
            reload_on_resume: false,
        }
    }
}

impl MapperConfig {
    /// A config that never animates.
    pub fn unanimated() -> Self {
        Self {
            should_animate_updates: false,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_animation(mut self, enable: bool) -> Self {
        self.should_animate_updates = enable;
        self
    }

    #[must_use]
    pub fn with_reload_on_resume(mut self, enable: bool) -> Self {
        self.reload_on_resume = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MapperConfig::default();
        assert!(config.should_animate_updates);
        assert!(!config.reload_on_resume);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: MapperConfig =
            serde_json::from_str(r#"{"reload_on_resume": true}"#).expect("parse config");
        assert!(config.should_animate_updates);
        assert!(config.reload_on_resume);
    }

    #[test]
    fn test_unanimated() {
        assert!(!MapperConfig::unanimated().should_animate_updates);
    }
}
