//! Planner configuration.
use anyhow::Context;
use enumset::EnumSet;
use serde::Deserialize;

use crate::cost::{CostConstants, CostModel, JoinStrategy};
use crate::error::RelResult;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub costs: CostConstants,
    /// Strategies the planner may pick for joins.
    pub strategies: Vec<JoinStrategy>,
    /// Log every finished plan tree.
    pub explain: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            costs: CostConstants::default(),
            strategies: EnumSet::<JoinStrategy>::all().iter().collect(),
            explain: false,
        }
    }
}

impl PlannerConfig {
    pub fn from_yaml(yaml: &str) -> RelResult<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse planner config")
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.costs).with_strategies(self.strategies.iter().copied().collect())
    }
}
