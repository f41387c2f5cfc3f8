//! Plan execution.
//!
//! Bound variables are materialised step by step in a [`Bindings`] table. Components below a
//! cut run on the distinct projection of the bound table onto their inputs, and are merged
//! back on those variables.
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use log::debug;
use prettytable::{Cell, Row, Table};

use crate::cost::JoinStrategy;
use crate::plan::{Access, ComponentPlan, Plan, Step};
use crate::query::{QueryGraph, Var};
use crate::relation::{PartialBinding, Relation};
use crate::value::{Tuple, Value};

/// A table of values for a list of variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bindings {
    vars: Vec<Var>,
    rows: Vec<Tuple>,
}

impl Bindings {
    pub fn new(vars: Vec<Var>, rows: Vec<Tuple>) -> Self {
        Self { vars, rows }
    }

    /// One empty row, the neutral element of [`Bindings::merge`].
    pub fn unit() -> Self {
        Self::new(vec![], vec![Tuple::new()])
    }

    /// One row holding every constant.
    pub fn constants(constants: &BTreeMap<Var, Value>) -> Self {
        Self::new(
            constants.keys().cloned().collect(),
            vec![constants.values().cloned().collect()],
        )
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, var: &Var) -> Option<usize> {
        self.vars.iter().position(|v| v == var)
    }

    /// Distinct rows over `vars`, skipping variables this table lacks.
    pub fn project(&self, vars: &[Var]) -> Self {
        let (vars, columns): (Vec<Var>, Vec<usize>) = vars
            .iter()
            .filter_map(|v| self.column(v).map(|c| (v.clone(), c)))
            .unzip();
        let rows = self
            .rows
            .iter()
            .map(|row| columns.iter().map(|&c| row[c].clone()).collect::<Tuple>())
            .unique()
            .collect();
        Self::new(vars, rows)
    }

    /// Joins on the shared variables, a cross join when there are none.
    pub fn merge(&self, other: &Bindings) -> Self {
        let shared = self
            .vars
            .iter()
            .enumerate()
            .filter_map(|(s, v)| other.column(v).map(|o| (s, o)))
            .collect_vec();
        let extra = (0..other.vars.len())
            .filter(|c| shared.iter().all(|(_, o)| o != c))
            .collect_vec();

        let mut index: HashMap<Vec<&Value>, Vec<&Tuple>> = HashMap::new();
        for row in &other.rows {
            let key = shared.iter().map(|(_, o)| &row[*o]).collect_vec();
            index.entry(key).or_default().push(row);
        }

        let mut rows = Vec::new();
        for row in &self.rows {
            let key = shared.iter().map(|(s, _)| &row[*s]).collect_vec();
            for matched in index.get(&key).into_iter().flatten() {
                let mut out = row.clone();
                out.extend(extra.iter().map(|&c| matched[c].clone()));
                rows.push(out);
            }
        }

        let vars = self
            .vars
            .iter()
            .chain(extra.iter().map(|&c| &other.vars[c]))
            .cloned()
            .collect();
        Self::new(vars, rows)
    }

    pub fn distinct(self) -> Self {
        Self::new(self.vars, self.rows.into_iter().unique().collect())
    }

    pub fn sorted(mut self) -> Self {
        self.rows.sort();
        self
    }
}

impl Display for Bindings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.set_titles(Row::new(
            self.vars.iter().map(|v| Cell::new(v.name())).collect(),
        ));
        for row in &self.rows {
            table.add_row(Row::new(
                row.iter().map(|v| Cell::new(&v.to_string())).collect(),
            ));
        }
        write!(f, "{}", table)
    }
}

/// Final answers of a query, restartable through [`Answers::iter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answers {
    bindings: Bindings,
}

impl Answers {
    pub fn vars(&self) -> &[Var] {
        self.bindings.vars()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = BTreeMap<&Var, &Value>> + '_ {
        self.bindings
            .rows
            .iter()
            .map(move |row| self.bindings.vars.iter().zip(row.iter()).collect())
    }

    /// Answers as sorted tuples over `vars`.
    pub fn tuples(&self, vars: &[Var]) -> Vec<Tuple> {
        let columns = vars
            .iter()
            .filter_map(|v| self.bindings.column(v))
            .collect_vec();
        self.bindings
            .rows
            .iter()
            .map(|row| columns.iter().map(|&c| row[c].clone()).collect::<Tuple>())
            .sorted()
            .collect()
    }

    pub fn into_bindings(self) -> Bindings {
        self.bindings
    }
}

impl Display for Answers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bindings)
    }
}

pub fn execute(plan: &Plan, query: &QueryGraph) -> Answers {
    let constants = Bindings::constants(query.constants());
    let bindings = plan
        .components()
        .iter()
        .fold(constants.clone(), |acc, component| {
            let input = constants.project(&component.inputs);
            acc.merge(&run_component(component, query, input))
        });

    Answers {
        bindings: bindings.distinct(),
    }
}

fn run_component(component: &ComponentPlan, query: &QueryGraph, input: Bindings) -> Bindings {
    let mut rows = component
        .steps
        .iter()
        .fold(input, |rows, step| run_step(step, query, rows));

    if let Some(cut) = &component.cut {
        for sub in &cut.components {
            let sub_rows = run_component(sub, query, rows.project(&sub.inputs));
            rows = rows.merge(&sub_rows);
        }
    }
    rows
}

fn run_step(step: &Step, query: &QueryGraph, rows: Bindings) -> Bindings {
    let atom = query.atom(step.atom);
    let relation = atom.relation();
    let names = relation.attribute_names();

    // (row column, attribute) of bound terms, (attribute index, var) of free ones.
    let mut bound = Vec::new();
    let mut free = Vec::new();
    for (var, attribute) in atom.terms() {
        match rows.column(var) {
            Some(c) => bound.push((c, attribute.clone())),
            None => {
                if let Some(i) = names.iter().position(|n| n == attribute) {
                    free.push((i, var.clone()));
                }
            }
        }
    }
    let bound_columns = bound
        .iter()
        .filter_map(|(_, a)| names.iter().position(|n| n == a))
        .collect_vec();

    let widen = |row: &Tuple, t: &Tuple| -> Tuple {
        let mut out = row.clone();
        out.extend(free.iter().map(|(i, _)| t[*i].clone()));
        out
    };

    let mut out = Vec::new();
    match step.access {
        Access::Lookup | Access::Join(JoinStrategy::Iterate) => {
            for row in &rows.rows {
                let binding: PartialBinding = bound
                    .iter()
                    .map(|(c, a)| (a.clone(), row[*c].clone()))
                    .collect();
                let lookup = relation.lookup(&binding);
                out.extend(lookup.iter().map(|t| widen(row, &t)));
            }
        }
        Access::Join(JoinStrategy::Intermediate) => {
            let mut index: BTreeMap<Vec<Value>, Vec<Tuple>> = BTreeMap::new();
            for t in relation.lookup(&PartialBinding::new()).iter() {
                let key = bound_columns.iter().map(|&i| t[i].clone()).collect_vec();
                index.entry(key).or_default().push(t);
            }
            for row in &rows.rows {
                let key = bound.iter().map(|(c, _)| row[*c].clone()).collect_vec();
                if let Some(matched) = index.get(&key) {
                    out.extend(matched.iter().map(|t| widen(row, t)));
                }
            }
        }
        Access::Join(JoinStrategy::Filter) => {
            let mut members: HashMap<Vec<&Value>, Vec<&Tuple>> = HashMap::new();
            for row in &rows.rows {
                let key = bound.iter().map(|(c, _)| &row[*c]).collect_vec();
                members.entry(key).or_default().push(row);
            }
            for t in relation.lookup(&PartialBinding::new()).iter() {
                let key = bound_columns.iter().map(|&i| &t[i]).collect_vec();
                if let Some(matched) = members.get(&key) {
                    out.extend(matched.iter().map(|row| widen(*row, &t)));
                }
            }
        }
    }

    debug!(
        "Step {} over atom {} turned {} bound tuples into {}",
        step.access,
        step.atom,
        rows.len(),
        out.len()
    );

    let vars = rows
        .vars
        .iter()
        .cloned()
        .chain(free.iter().map(|(_, v)| v.clone()))
        .collect();
    Bindings::new(vars, out)
}
