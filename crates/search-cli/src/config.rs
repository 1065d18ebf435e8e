//! TOML config loading for the library-search CLI.
//!
//! Deserializes `configs/search.toml`, which has a `[search]` section, then
//! merges CLI overrides on top.

use std::path::Path;

use search::SearchConfig;
use serde::Deserialize;

/// Top-level structure matching `configs/search.toml`.
#[derive(Debug, Deserialize)]
pub struct SearchToml {
    /// Library search parameters.
    #[serde(default)]
    pub search: SearchConfig,
}

/// Command-line overrides for `SearchConfig` fields.
#[derive(Debug, Default)]
pub struct SearchOverrides {
    pub max_results: Option<usize>,
    pub max_heartbeats: Option<u64>,
    /// Leave failed `exact?` goals open instead of admitting them.
    pub no_admit: bool,
}

impl SearchOverrides {
    /// Priority chain: defaults < TOML values < CLI flags.
    pub fn apply(&self, config: &mut SearchConfig) {
        if let Some(n) = self.max_results {
            config.max_results = n;
        }
        if let Some(n) = self.max_heartbeats {
            config.max_heartbeats = n;
        }
        if self.no_admit {
            config.admit_on_failure = false;
        }
    }
}

/// Load and deserialize a `SearchToml` from a TOML file.
pub fn load_search_toml(path: &Path) -> anyhow::Result<SearchToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: SearchToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), "Loaded search config");
    Ok(config)
}

/// Config from `path` when given, defaults otherwise, with `overrides` applied.
pub fn resolve_search_config(
    path: Option<&Path>,
    overrides: &SearchOverrides,
) -> anyhow::Result<SearchConfig> {
    let mut config = match path {
        Some(path) => load_search_toml(path)?.search,
        None => SearchConfig::default(),
    };
    overrides.apply(&mut config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use search::LimitOrder;
    use std::io::Write;

    #[test]
    fn test_deserialize_full_search_toml() {
        let toml_str = r#"
[search]
max_results = 5
max_heartbeats = 1000
admit_on_failure = false
exclude_introduced = true
limit_order = "budget_first"
"#;
        let config: SearchToml = toml::from_str(toml_str).unwrap();
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.max_heartbeats, 1000);
        assert!(!config.search.admit_on_failure);
        assert!(config.search.exclude_introduced);
        assert_eq!(config.search.limit_order, LimitOrder::BudgetFirst);
    }

    #[test]
    fn test_missing_search_section_uses_defaults() {
        let config: SearchToml = toml::from_str("").unwrap();
        assert_eq!(config.search.max_results, 10);
        assert!(config.search.admit_on_failure);
    }

    #[test]
    fn test_cli_override_priority() {
        let mut config = SearchConfig {
            max_results: 3,
            ..Default::default()
        };
        let overrides = SearchOverrides {
            max_results: Some(7),
            max_heartbeats: None,
            no_admit: true,
        };
        overrides.apply(&mut config);
        assert_eq!(config.max_results, 7);
        assert_eq!(config.max_heartbeats, 200_000);
        assert!(!config.admit_on_failure);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nmax_results = 2").unwrap();
        let config =
            resolve_search_config(Some(file.path()), &SearchOverrides::default()).unwrap();
        assert_eq!(config.max_results, 2);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_search_toml(&dir.path().join("nope.toml"));
        assert!(result.is_err());
    }
}
