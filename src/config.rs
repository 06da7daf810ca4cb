use crate::statics;
use crate::validate::PropertyRule;
use anyhow::Context;
use indexmap::IndexMap;
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

/// Tunables for extraction, injection and the text-edit debounce.
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period after the last XML keystroke before extraction runs.
    pub debounce_ms: u64,
    /// Local names of the elements whose properties are tracked.
    pub tracked_kinds: Vec<String>,
    /// Namespace URI of generated property blocks.
    pub extension_namespace: String,
    /// Prefix to declare when `extension_namespace` is not bound in scope.
    pub extension_prefix: String,
    /// Indent unit for generated blocks.
    pub indent: String,
    /// Elements nested deeper than this are not visited.
    pub max_depth: usize,
    /// Property name -> rule applied to values entered in the properties panel.
    pub rules: IndexMap<String, PropertyRule>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let mut rules = IndexMap::new();
        rules.insert(statics::PROP_VERSION.to_string(), PropertyRule::Version);
        rules.insert(
            statics::PROP_SERVICE_VERSION.to_string(),
            PropertyRule::Version,
        );
        rules.insert(statics::PROP_SERVICE_ID.to_string(), PropertyRule::Identifier);

        Self {
            debounce_ms: statics::DEFAULT_DEBOUNCE_MS,
            tracked_kinds: statics::DEFAULT_TRACKED_KINDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            extension_namespace: statics::DEFAULT_EXTENSION_NAMESPACE.to_string(),
            extension_prefix: statics::DEFAULT_EXTENSION_PREFIX.to_string(),
            indent: statics::DEFAULT_INDENT.to_string(),
            max_depth: statics::DEFAULT_MAX_DEPTH,
            rules,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: SyncConfig = toml::from_str(text).context("parsing sync config")?;
        Ok(config)
    }

    pub fn load_path(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        Self::from_toml_str(&text).with_context(|| format!("loading {path:?}"))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn is_tracked(&self, local_name: &str) -> bool {
        self.tracked_kinds.iter().any(|k| k == local_name)
    }
}

#[cfg(test)]
mod tests {
    use super::SyncConfig;
    use crate::validate::PropertyRule;
    use std::time::Duration;

    #[test]
    fn defaults_track_service_tasks_with_half_second_debounce() {
        let config = SyncConfig::default();
        assert!(config.is_tracked("serviceTask"));
        assert!(!config.is_tracked("sequenceFlow"));
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(
            config.rules.get("service.version"),
            Some(&PropertyRule::Version)
        );
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
debounce_ms = 250
tracked_kinds = ["serviceTask"]

[rules]
"api.version" = "version"
"#,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.tracked_kinds, vec!["serviceTask".to_string()]);
        assert_eq!(config.extension_prefix, "camunda");
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules.get("api.version"), Some(&PropertyRule::Version));
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let err = SyncConfig::from_toml_str("[rules]\nx = \"bogus\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("parsing sync config"));
    }
}
