//! Defines cost model.
//!
//! A join of an atom against `B` already bound tuples can be evaluated three ways:
//!
//! * iterate: probe the relation once per bound tuple, `B * c_iterate * probe_rows`.
//! * intermediate: materialise the relation keyed on the join attributes and probe that,
//!   `L * log2(L) + B * c_intermediate`.
//! * filter: scan the relation and test each tuple against the bound set, `L * c_filter`.
//!
//! `probe_rows` is the number of tuples a single probe touches, `1` when an index answers it.

use derive_more::{Add, AddAssign, Display, Sub, SubAssign, Sum};
use enumset::{EnumSet, EnumSetType};
use log::{debug, warn};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display as StrumDisplay};

mod calibrate;
pub use calibrate::*;

pub const INF: Cost = Cost(f64::INFINITY);

#[derive(
    Copy, Clone, Debug, Display, PartialOrd, PartialEq, Add, Sub, Sum, AddAssign, SubAssign,
)]
pub struct Cost(f64);

impl From<f64> for Cost {
    fn from(c: f64) -> Self {
        Cost(c)
    }
}

impl Cost {
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// How a join against a not yet bound relation is evaluated.
///
/// Declaration order is the tie break order.
#[derive(EnumSetType, Debug, Hash, AsRefStr, StrumDisplay, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    Iterate,
    Intermediate,
    Filter,
}

/// Per operation multipliers of the cost formulas.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CostConstants {
    pub iterate: f64,
    pub intermediate: f64,
    pub filter: f64,
}

impl Default for CostConstants {
    fn default() -> Self {
        Self {
            iterate: 1.0,
            intermediate: 1.0,
            filter: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CostModel {
    constants: CostConstants,
    enabled: EnumSet<JoinStrategy>,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(CostConstants::default())
    }
}

impl CostModel {
    pub fn new(constants: CostConstants) -> Self {
        Self {
            constants,
            enabled: EnumSet::all(),
        }
    }

    /// Restricts the strategies the model may choose. An empty set keeps all of them.
    pub fn with_strategies(mut self, enabled: EnumSet<JoinStrategy>) -> Self {
        if enabled.is_empty() {
            warn!("Ignoring empty join strategy set");
        } else {
            self.enabled = enabled;
        }
        self
    }

    pub fn constants(&self) -> &CostConstants {
        &self.constants
    }

    /// Costs of every enabled strategy, in tie break order.
    pub fn strategy_costs(&self, b: f64, l: f64, probe_rows: f64) -> Vec<(JoinStrategy, Cost)> {
        let c = &self.constants;
        self.enabled
            .iter()
            .map(|strategy| {
                let cost = match strategy {
                    JoinStrategy::Iterate => mul(mul(b, c.iterate), probe_rows),
                    JoinStrategy::Intermediate => sort_cost(l) + mul(b, c.intermediate),
                    JoinStrategy::Filter => mul(l, c.filter),
                };
                (strategy, Cost::from(cost))
            })
            .collect()
    }

    /// Cost of probing an index once per bound tuple.
    pub fn lookup_cost(&self, b: f64) -> Cost {
        Cost::from(mul(b, self.constants.iterate))
    }

    /// Cheapest enabled strategy, ties go to the earlier one.
    pub fn choose(&self, b: f64, l: f64, probe_rows: f64) -> (JoinStrategy, Cost) {
        let costs = self.strategy_costs(b, l, probe_rows);
        let chosen = costs
            .iter()
            .copied()
            .reduce(|best, next| if next.1 < best.1 { next } else { best })
            .unwrap_or((JoinStrategy::Iterate, INF));

        debug!(
            "Strategy costs for B={} L={} probe_rows={}: {:?}, chose {}",
            b, l, probe_rows, costs, chosen.0
        );
        chosen
    }
}

/// Products where zero wins over infinity.
pub(crate) fn mul(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

fn sort_cost(l: f64) -> f64 {
    if l > 1.0 {
        l * l.log2()
    } else {
        l.max(0.0)
    }
}
