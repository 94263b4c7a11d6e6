//! `/engine` block: watchdog, pacing, controller retry policy, security,
//! and plugin search path. Applied twice during a layer merge (spec §4.1
//! steps 3 and 5) so a parent stack's settings always win over an
//! included child's.

use crate::watchdog::WatchdogConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub enable_command_action: bool,
    #[serde(default)]
    pub enable_hooks: bool,
    #[serde(default = "default_true")]
    pub enable_interpolation: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_include_depth() -> usize {
    64
}

impl Default for SecurityConfig {
    fn default() -> SecurityConfig {
        SecurityConfig {
            max_include_depth: default_max_include_depth(),
            strict: false,
            secure: false,
            enable_command_action: true,
            enable_hooks: true,
            enable_interpolation: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub watchdog: WatchdogConfig,
    #[serde(with = "humantime_serde", default = "default_polling_interval")]
    pub polling_interval: Duration,
    #[serde(default)]
    pub keep_alive: bool,
    #[serde(default)]
    pub probe_simulation: bool,
    #[serde(with = "humantime_serde", default = "default_controller_retry_sleep")]
    pub controller_retry_sleep: Duration,
    #[serde(default = "default_controller_retry_limit")]
    pub controller_retry_limit: u32,
    #[serde(default = "default_abort_on_controller_failure")]
    pub abort_on_controller_failure: bool,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub plugin_path: Vec<PathBuf>,
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_polling_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_controller_retry_sleep() -> Duration {
    Duration::from_millis(20)
}

fn default_controller_retry_limit() -> u32 {
    1000
}

fn default_abort_on_controller_failure() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            watchdog: WatchdogConfig::default(),
            polling_interval: default_polling_interval(),
            keep_alive: false,
            probe_simulation: false,
            controller_retry_sleep: default_controller_retry_sleep(),
            controller_retry_limit: default_controller_retry_limit(),
            abort_on_controller_failure: default_abort_on_controller_failure(),
            security: SecurityConfig::default(),
            plugin_path: Vec::new(),
            ignore: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Applies `--strict`: implies no-system-plugins/no-system-confs and
    /// require-success (the latter is handled by the CLI layer).
    pub fn apply_strict(&mut self) {
        self.security.strict = true;
    }

    /// Applies `--secure`: implies strict, no-hooks, no-interpolate.
    pub fn apply_secure(&mut self) {
        self.apply_strict();
        self.security.secure = true;
        self.security.enable_hooks = false;
        self.security.enable_interpolation = false;
    }

    /// Merges `other`'s settings over `self`'s, used when an including
    /// layer's engine block must override an included child's (spec §4.1
    /// step 5: "re-apply `/engine` from *this* layer").
    pub fn override_with(&mut self, other: EngineConfig) {
        *self = other;
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_implies_strict_and_no_hooks() {
        let mut engine = EngineConfig::default();
        engine.apply_secure();
        assert!(engine.security.strict);
        assert!(engine.security.secure);
        assert!(!engine.security.enable_hooks);
        assert!(!engine.security.enable_interpolation);
    }

    #[test]
    fn default_max_include_depth_is_64() {
        assert_eq!(EngineConfig::default().security.max_include_depth, 64);
    }
}
