//! Query graphs.
//!
//! A conjunctive query is a list of atoms. Each atom references a relation and maps query
//! variables to attributes of it. Atoms sharing a variable are adjacent in the query graph.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use derive_more::{Display as DeriveDisplay, From};
use itertools::Itertools;
use petgraph::graph::UnGraph;
use petgraph::unionfind::UnionFind;

use crate::error::{SchemaError, SchemaResult};
use crate::relation::{Relation, RelationImpl};
use crate::value::Value;

#[derive(Clone, Debug, DeriveDisplay, From, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Var(String);

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        Var(s.to_string())
    }
}

impl Var {
    pub fn name(&self) -> &str {
        &self.0
    }
}

pub type AtomId = usize;

/// One relation occurrence in a query.
#[derive(Debug, Clone)]
pub struct Atom {
    relation: Arc<RelationImpl>,
    /// Variables and the attribute each one is bound to, in attribute order.
    terms: Vec<(Var, String)>,
}

impl Atom {
    pub fn relation(&self) -> &Arc<RelationImpl> {
        &self.relation
    }

    pub fn terms(&self) -> &[(Var, String)] {
        &self.terms
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.terms.iter().map(|(v, _)| v)
    }

    pub fn attribute_of(&self, var: &Var) -> Option<&str> {
        self.terms
            .iter()
            .find(|(v, _)| v == var)
            .map(|(_, a)| a.as_str())
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({})",
            self.terms
                .iter()
                .map(|(v, a)| format!("{}: {}", a, v))
                .join(", ")
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryGraph {
    atoms: Vec<Atom>,
    constants: BTreeMap<Var, Value>,
}

impl QueryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an atom over `relation`, mapping each variable to one of its attributes.
    pub fn add_atom<I, V, A>(
        &mut self,
        relation: Arc<RelationImpl>,
        mapping: I,
    ) -> SchemaResult<AtomId>
    where
        I: IntoIterator<Item = (V, A)>,
        V: Into<Var>,
        A: Into<String>,
    {
        let mut terms: Vec<(Var, String)> = Vec::new();
        for (var, attribute) in mapping {
            let (var, attribute) = (var.into(), attribute.into());
            if !relation.attribute_names().contains(&attribute) {
                return Err(SchemaError::UnknownAttribute(attribute));
            }
            if terms.iter().any(|(v, _)| v == &var) {
                return Err(SchemaError::DuplicateVariable(var.0));
            }
            if terms.iter().any(|(_, a)| a == &attribute) {
                return Err(SchemaError::DuplicateAttribute(attribute));
            }
            terms.push((var, attribute));
        }

        let names = relation.attribute_names();
        terms.sort_by_key(|(_, a)| names.iter().position(|n| n == a));

        self.atoms.push(Atom { relation, terms });
        Ok(self.atoms.len() - 1)
    }

    /// Binds `var` to a constant for the whole query.
    pub fn bind<V: Into<Var>, T: Into<Value>>(&mut self, var: V, value: T) -> &mut Self {
        self.constants.insert(var.into(), value.into());
        self
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, id: AtomId) -> &Atom {
        &self.atoms[id]
    }

    pub fn constants(&self) -> &BTreeMap<Var, Value> {
        &self.constants
    }

    pub fn vars(&self) -> BTreeSet<&Var> {
        self.atoms.iter().flat_map(Atom::vars).collect()
    }

    /// Atoms as nodes, one edge per variable shared by two atoms.
    pub fn graph(&self) -> UnGraph<AtomId, Var> {
        let mut graph = UnGraph::with_capacity(self.atoms.len(), 0);
        let nodes = (0..self.atoms.len())
            .map(|id| graph.add_node(id))
            .collect_vec();
        for (a, b) in (0..self.atoms.len()).tuple_combinations() {
            for var in self.atoms[a].vars() {
                if self.atoms[b].attribute_of(var).is_some() {
                    graph.add_edge(nodes[a], nodes[b], var.clone());
                }
            }
        }
        graph
    }

    /// Splits `atoms` into groups connected through variables outside `bound`.
    ///
    /// Groups are ordered by their smallest atom, atoms within a group ascending.
    pub fn components(&self, atoms: &[AtomId], bound: &BTreeSet<Var>) -> Vec<Vec<AtomId>> {
        let mut sets = UnionFind::<usize>::new(atoms.len());
        for (i, j) in (0..atoms.len()).tuple_combinations() {
            let linked = self.atoms[atoms[i]]
                .vars()
                .any(|v| !bound.contains(v) && self.atoms[atoms[j]].attribute_of(v).is_some());
            if linked {
                sets.union(i, j);
            }
        }

        let mut groups = BTreeMap::<usize, Vec<AtomId>>::new();
        for (i, &atom) in atoms.iter().enumerate() {
            groups.entry(sets.find(i)).or_default().push(atom);
        }
        groups
            .into_values()
            .map(|mut g| {
                g.sort_unstable();
                g
            })
            .sorted_by_key(|g| g[0])
            .collect()
    }
}
