//! Evaluation plans produced by the [`Planner`](crate::planner::Planner).
//!
//! A plan is a list of independent components merged at the end. Each component resolves its
//! atoms one [`Step`] at a time. When a step disconnects the remaining atoms, the component ends
//! in a [`Cut`], whose sub components are planned and evaluated on their own and merged back
//! on the variables bound at that point.
use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;
use itertools::Itertools;

use crate::cost::{Cost, JoinStrategy};
use crate::estimate::Basis;
use crate::query::{AtomId, Var};

mod explain;
pub use explain::*;

/// How one atom is resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumAsInner)]
pub enum Access {
    /// The bound attributes are an index prefix, probe it per bound tuple.
    Lookup,
    Join(JoinStrategy),
}

impl Display for Access {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Lookup => write!(f, "lookup"),
            Access::Join(strategy) => write!(f, "join({})", strategy),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub atom: AtomId,
    /// Rendering of the atom, for explain output.
    pub label: String,
    /// Variable whose estimate picked this atom, `None` when all were bound.
    pub target: Option<Var>,
    pub access: Access,
    pub basis: Basis,
    /// Estimated bound tuples before this step.
    pub input: f64,
    /// Estimated tuples per bound tuple.
    pub fanout: f64,
    pub cost: Cost,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComponentPlan {
    pub atoms: Vec<AtomId>,
    /// Bound variables the component reads from its caller.
    pub inputs: Vec<Var>,
    pub steps: Vec<Step>,
    pub cut: Option<Cut>,
    /// Estimated result tuples.
    pub estimate: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cut {
    /// Variables bound when the component fell apart.
    pub keys: Vec<Var>,
    pub components: Vec<ComponentPlan>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    components: Vec<ComponentPlan>,
}

impl Plan {
    pub fn new(components: Vec<ComponentPlan>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[ComponentPlan] {
        &self.components
    }

    /// Steps in evaluation order.
    pub fn steps(&self) -> Vec<&Step> {
        self.components.iter().flat_map(ComponentPlan::all_steps).collect()
    }

    /// Atoms in evaluation order.
    pub fn order(&self) -> Vec<AtomId> {
        self.steps().iter().map(|s| s.atom).collect()
    }

    /// Access chosen for every atom, in evaluation order.
    pub fn strategies(&self) -> Vec<(AtomId, Access)> {
        self.steps().iter().map(|s| (s.atom, s.access)).collect()
    }

    pub fn estimate(&self) -> f64 {
        self.components.iter().map(|c| c.estimate).product()
    }

    pub fn cost(&self) -> Cost {
        self.steps().iter().map(|s| s.cost).sum()
    }
}

impl ComponentPlan {
    fn all_steps(&self) -> Vec<&Step> {
        self.steps
            .iter()
            .chain(
                self.cut
                    .iter()
                    .flat_map(|c| c.components.iter().flat_map(ComponentPlan::all_steps)),
            )
            .collect_vec()
    }
}
