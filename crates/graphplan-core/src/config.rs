//! Planner configuration.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::plan::JoinType;

/// Limits on how far a request may expand the path tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandBudget {
    /// Maximum number of navigation steps from the root.
    pub max_depth: usize,
    /// Maximum number of expand clauses in one request.
    pub max_branches: usize,
}

impl Default for ExpandBudget {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_branches: 16,
        }
    }
}

impl ExpandBudget {
    /// Create a budget with custom limits.
    pub fn new(max_depth: usize, max_branches: usize) -> Self {
        Self {
            max_depth,
            max_branches,
        }
    }

    /// Create an unlimited budget (use with caution).
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
            max_branches: usize::MAX,
        }
    }
}

/// When a request is split into a seed plan plus per-branch secondary plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitMode {
    /// Split when two or more collection branches are expanded.
    #[default]
    MultiBranch,
    /// Split whenever any branch is expanded.
    AnyExpand,
    /// Never split; every expansion is joined inline.
    Never,
}

/// Configuration for the plan builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Join type for joins induced by filter, order and aggregate paths.
    /// Expanded navigations always use left joins.
    pub default_join: JoinType,

    /// Expansion limits.
    pub budget: ExpandBudget,

    /// Branch splitting policy.
    pub split_mode: SplitMode,

    /// Alias of the synthetic column carrying the concrete type of a
    /// polymorphic row.
    pub discriminator_alias: String,

    /// Alias of the total-count column.
    pub count_alias: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_join: JoinType::Inner,
            budget: ExpandBudget::default(),
            split_mode: SplitMode::MultiBranch,
            discriminator_alias: "$type".to_string(),
            count_alias: "$count".to_string(),
        }
    }
}

impl PlannerConfig {
    /// Read a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Set the join type for filter-induced joins.
    pub fn default_join(mut self, join_type: JoinType) -> Self {
        self.default_join = join_type;
        self
    }

    /// Set the expansion budget.
    pub fn budget(mut self, budget: ExpandBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the branch splitting policy.
    pub fn split_mode(mut self, mode: SplitMode) -> Self {
        self.split_mode = mode;
        self
    }

    /// Set the discriminator alias.
    pub fn discriminator_alias(mut self, alias: impl Into<String>) -> Self {
        self.discriminator_alias = alias.into();
        self
    }

    /// Set the count alias.
    pub fn count_alias(mut self, alias: impl Into<String>) -> Self {
        self.count_alias = alias.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.default_join, JoinType::Inner);
        assert_eq!(config.split_mode, SplitMode::MultiBranch);
        assert_eq!(config.discriminator_alias, "$type");
        assert_eq!(config.budget.max_depth, 5);
    }

    #[test]
    fn test_from_json_partial() {
        let config = PlannerConfig::from_json_str(
            r#"{ "default_join": "Left", "budget": { "max_depth": 2, "max_branches": 4 } }"#,
        )
        .unwrap();

        assert_eq!(config.default_join, JoinType::Left);
        assert_eq!(config.budget, ExpandBudget::new(2, 4));
        assert_eq!(config.count_alias, "$count");
    }

    #[test]
    fn test_from_json_invalid() {
        let err = PlannerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_builder() {
        let config = PlannerConfig::default()
            .split_mode(SplitMode::Never)
            .budget(ExpandBudget::unlimited())
            .discriminator_alias("kind");

        assert_eq!(config.split_mode, SplitMode::Never);
        assert_eq!(config.budget.max_branches, usize::MAX);
        assert_eq!(config.discriminator_alias, "kind");
    }
}
