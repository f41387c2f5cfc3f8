//! Greedy, cost driven join ordering.
//!
//! Planning starts from the variables bound by query constants. Every atom with at least one
//! bound variable is on the frontier. The planner repeatedly resolves the frontier atom whose
//! cheapest unbound variable has the lowest estimated cardinality, anywhere on the frontier and
//! not only next to the previous atom. Resolving an atom binds all its variables, which may
//! pull new atoms onto the frontier.
//!
//! An atom whose bound attributes are an index prefix is resolved by a lookup. Any other atom is
//! joined with the cheapest [`JoinStrategy`](crate::cost::JoinStrategy) given the size of the
//! bound set and of the relation.
//!
//! When a resolution leaves the remaining atoms linked only through bound variables, they fall
//! apart into independent components. Each is planned on its own, and their results are merged
//! on the bound variables afterwards. Atoms sharing nothing with the rest of the query form
//! singleton components from the start, so planning never fails.
use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::{debug, info, trace, warn};

use crate::config::PlannerConfig;
use crate::cost::{mul, CostModel};
use crate::estimate::{Basis, Estimate, Estimator};
use crate::exec::{execute, Answers};
use crate::plan::{explain_to_string, Access, ComponentPlan, Cut, Plan, Step};
use crate::query::{AtomId, QueryGraph, Var};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AtomState {
    Unresolved,
    /// At least one variable is bound.
    Frontier,
    Resolved,
}

#[derive(Default)]
pub struct Planner {
    config: PlannerConfig,
    model: CostModel,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        let model = config.cost_model();
        Self { config, model }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, query: &QueryGraph) -> Plan {
        let estimator = Estimator::new(query);
        let bound: BTreeSet<Var> = query.constants().keys().cloned().collect();
        let atoms = (0..query.atoms().len()).collect_vec();

        let mut components = query
            .components(&atoms, &bound)
            .into_iter()
            .map(|group| self.plan_component(query, &estimator, group, &bound, 1.0))
            .collect_vec();
        components.sort_by(|a, b| a.estimate.total_cmp(&b.estimate));

        let plan = Plan::new(components);
        if self.config.explain {
            match explain_to_string(&plan) {
                Ok(tree) => info!("Plan for {} atoms:\n{}", atoms.len(), tree),
                Err(e) => warn!("Failed to explain plan: {}", e),
            }
        }
        plan
    }

    /// Plans and evaluates `query`.
    pub fn evaluate(&self, query: &QueryGraph) -> Answers {
        execute(&self.plan(query), query)
    }

    /// Plans one connected group of atoms, starting from `outer` bound variables and an
    /// estimated `input` bound tuples.
    fn plan_component(
        &self,
        query: &QueryGraph,
        estimator: &Estimator,
        atoms: Vec<AtomId>,
        outer: &BTreeSet<Var>,
        input: f64,
    ) -> ComponentPlan {
        let mut bound: BTreeSet<Var> = atoms
            .iter()
            .flat_map(|&a| query.atom(a).vars())
            .filter(|v| outer.contains(*v))
            .cloned()
            .collect();
        let inputs = bound.iter().cloned().collect_vec();
        let mut states: BTreeMap<AtomId, AtomState> =
            atoms.iter().map(|&a| (a, AtomState::Unresolved)).collect();
        let mut remaining = atoms.clone();
        let mut steps = Vec::with_capacity(atoms.len());
        let mut rows = input;

        while !remaining.is_empty() {
            for &a in &remaining {
                let atom = query.atom(a);
                let reached = atom.terms().is_empty() || atom.vars().any(|v| bound.contains(v));
                if reached && states[&a] == AtomState::Unresolved {
                    trace!("Atom {} joins the frontier", a);
                    states.insert(a, AtomState::Frontier);
                }
            }

            let frontier = remaining
                .iter()
                .copied()
                .filter(|a| states[a] == AtomState::Frontier)
                .collect_vec();
            let candidates = if frontier.is_empty() {
                trace!("Empty frontier, seeding from {:?}", remaining);
                remaining.clone()
            } else {
                frontier
            };

            let (atom, target, estimate) = best_candidate(query, estimator, &candidates, &bound);
            let step = self.resolve(query, estimator, atom, target, estimate, &bound, rows);
            debug!(
                "Resolved atom {} by {} with fanout {} at cost {}",
                atom, step.access, step.fanout, step.cost
            );

            rows = mul(rows, step.fanout);
            bound.extend(query.atom(atom).vars().cloned());
            remaining.retain(|&a| a != atom);
            states.insert(atom, AtomState::Resolved);
            trace!("Atom {} resolved", atom);
            steps.push(step);

            if remaining.len() > 1 {
                let groups = query.components(&remaining, &bound);
                if groups.len() > 1 {
                    return self.cut(query, estimator, atoms, inputs, steps, groups, &bound, rows);
                }
            }
        }

        ComponentPlan {
            atoms,
            inputs,
            steps,
            cut: None,
            estimate: rows,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve(
        &self,
        query: &QueryGraph,
        estimator: &Estimator,
        atom: AtomId,
        target: Option<Var>,
        estimate: Estimate,
        bound: &BTreeSet<Var>,
        rows: f64,
    ) -> Step {
        let (access, cost) = match estimate.basis {
            Basis::Index { .. } => (Access::Lookup, self.model.lookup_cost(rows)),
            Basis::Degree { .. } | Basis::Extent => {
                let (strategy, cost) = self.model.choose(
                    rows,
                    estimator.extent(atom),
                    estimator.probe_rows(atom, bound),
                );
                (Access::Join(strategy), cost)
            }
        };

        Step {
            atom,
            label: query.atom(atom).to_string(),
            target,
            access,
            basis: estimate.basis,
            input: rows,
            fanout: estimate.cardinality,
            cost,
        }
    }

    /// Ends a component whose remaining atoms fell apart into `groups`.
    #[allow(clippy::too_many_arguments)]
    fn cut(
        &self,
        query: &QueryGraph,
        estimator: &Estimator,
        atoms: Vec<AtomId>,
        inputs: Vec<Var>,
        steps: Vec<Step>,
        groups: Vec<Vec<AtomId>>,
        bound: &BTreeSet<Var>,
        rows: f64,
    ) -> ComponentPlan {
        let keys = groups
            .iter()
            .flatten()
            .flat_map(|&a| query.atom(a).vars())
            .filter(|v| bound.contains(*v))
            .unique()
            .sorted()
            .cloned()
            .collect_vec();
        debug!(
            "Query graph split into {} components on {:?}",
            groups.len(),
            keys.iter().map(Var::name).collect_vec()
        );

        let mut components = groups
            .into_iter()
            .map(|group| self.plan_component(query, estimator, group, bound, rows))
            .collect_vec();
        components.sort_by(|a, b| a.estimate.total_cmp(&b.estimate));

        let estimate = split_estimate(rows, components.iter().map(|c| c.estimate));

        ComponentPlan {
            atoms,
            inputs,
            steps,
            cut: Some(Cut { keys, components }),
            estimate,
        }
    }
}

/// Joint estimate of components that each start from the same `rows` bound tuples.
fn split_estimate(rows: f64, estimates: impl IntoIterator<Item = f64>) -> f64 {
    if rows == 0.0 {
        0.0
    } else if rows.is_finite() {
        estimates.into_iter().fold(rows, |acc, e| mul(acc, e / rows))
    } else {
        // Unbounded input stays unbounded unless a component is empty.
        estimates.into_iter().fold(rows, mul)
    }
}

/// Frontier atom and target variable with the lowest estimate.
///
/// Ties go to the estimate needing fewer bound variables, then to the lower atom id and the
/// earlier variable.
fn best_candidate(
    query: &QueryGraph,
    estimator: &Estimator,
    candidates: &[AtomId],
    bound: &BTreeSet<Var>,
) -> (AtomId, Option<Var>, Estimate) {
    candidates
        .iter()
        .flat_map(|&a| {
            let unbound = query
                .atom(a)
                .vars()
                .filter(|v| !bound.contains(*v))
                .cloned()
                .collect_vec();
            if unbound.is_empty() {
                vec![(a, None, estimator.estimate(a, None, bound))]
            } else {
                unbound
                    .into_iter()
                    .map(|v| {
                        let e = estimator.estimate(a, Some(&v), bound);
                        (a, Some(v), e)
                    })
                    .collect_vec()
            }
        })
        .min_by(|(_, _, x), (_, _, y)| {
            x.cardinality
                .total_cmp(&y.cardinality)
                .then(x.required.cmp(&y.required))
        })
        .unwrap_or_else(|| {
            let a = candidates[0];
            (a, None, estimator.estimate(a, None, bound))
        })
}
