/// Which limit ends enumeration first when the result cap and the
/// heartbeat budget run out on the same pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitOrder {
    /// Reaching the cap stops the stream quietly, even with the budget spent.
    #[default]
    CapFirst,
    /// An exhausted budget is reported even if the cap was also reached.
    BudgetFirst,
}

/// Library search configuration loaded from TOML.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct SearchConfig {
    /// Maximum number of accepted candidates pulled from the oracle.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Heartbeat budget for one invocation (0 = no limit).
    #[serde(default = "default_max_heartbeats")]
    pub max_heartbeats: u64,

    /// Close the goal with a labelled `sorry` when `exact?` fails.
    #[serde(default = "default_admit_on_failure")]
    pub admit_on_failure: bool,

    /// Also forbid hypotheses introduced from the goal's binders in closing terms.
    ///
    /// Off by default: only the `without` names are excluded, and names bound
    /// by `intros` stay usable, so `P → P` closes with the introduced
    /// hypothesis. Turn it on to exclude every newly bound name as well.
    #[serde(default)]
    pub exclude_introduced: bool,

    #[serde(default)]
    pub limit_order: LimitOrder,
}

fn default_max_results() -> usize {
    10
}
fn default_max_heartbeats() -> u64 {
    200_000
}
fn default_admit_on_failure() -> bool {
    true
}

impl SearchConfig {
    /// Log a warning for settings that make the search useless or unbounded.
    pub fn validate(&self) {
        if self.max_results == 0 {
            tracing::warn!(
                max_results = self.max_results,
                "max_results = 0, no candidate will ever be examined"
            );
        }
        if self.max_heartbeats == 0 {
            tracing::warn!("max_heartbeats = 0, search is bounded only by the corpus size");
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            max_heartbeats: default_max_heartbeats(),
            admit_on_failure: default_admit_on_failure(),
            exclude_introduced: false,
            limit_order: LimitOrder::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cfg = SearchConfig::default();
        assert_eq!(cfg.max_results, 10);
        assert_eq!(cfg.max_heartbeats, 200_000);
        assert!(cfg.admit_on_failure);
        assert!(!cfg.exclude_introduced);
        assert_eq!(cfg.limit_order, LimitOrder::CapFirst);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
            max_results = 3
            admit_on_failure = false
        "#;
        let cfg: SearchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.max_results, 3);
        assert!(!cfg.admit_on_failure);
        // Defaults for unspecified fields
        assert_eq!(cfg.max_heartbeats, 200_000);
        assert_eq!(cfg.limit_order, LimitOrder::CapFirst);
    }

    #[test]
    fn test_full_toml() {
        let toml_str = r#"
            max_results = 25
            max_heartbeats = 0
            admit_on_failure = true
            exclude_introduced = true
            limit_order = "budget_first"
        "#;
        let cfg: SearchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.max_results, 25);
        assert_eq!(cfg.max_heartbeats, 0);
        assert!(cfg.exclude_introduced);
        assert_eq!(cfg.limit_order, LimitOrder::BudgetFirst);
    }

    #[test]
    fn test_unknown_limit_order_rejected() {
        let result: Result<SearchConfig, _> = toml::from_str(r#"limit_order = "whichever""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_degenerate() {
        // Should log warnings but not panic
        let cfg = SearchConfig {
            max_results: 0,
            max_heartbeats: 0,
            ..Default::default()
        };
        cfg.validate();
    }
}
