//! `/logging` entries: per-target-pattern log level overrides applied at
//! stack construction, before any plugin is loaded.

use crate::log::level::LoglevelFilter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConf {
    /// Glob-like pattern matched against a logger's name (e.g. `cloe::*`,
    /// `vtd`). A bare name matches exactly.
    pub name: String,
    pub level: LoglevelFilter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_name_and_level() {
        let conf: LoggingConf =
            serde_json::from_value(serde_json::json!({"name": "vtd", "level": "debug"})).unwrap();
        assert_eq!(conf.name, "vtd");
        assert_eq!(conf.level, LoglevelFilter::Debug);
    }
}
