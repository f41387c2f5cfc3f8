//! Cardinality estimation.
//!
//! Given the variables bound so far, the estimator predicts how many tuples one atom produces
//! per bound tuple. In priority order it uses:
//!
//! 1. an index, some source whose access key prefix is exactly the bound attribute set,
//! 2. a degree constraint whose domain is bound and whose range holds the target attribute,
//! 3. the full extent of the primary source.
//!
//! Ties go to the smaller estimate, then to the basis needing fewer bound variables, then to
//! declaration order, so the same inputs always give the same estimate.
use std::collections::BTreeSet;

use enum_as_inner::EnumAsInner;
use log::trace;

use crate::query::{AtomId, QueryGraph, Var};
use crate::relation::{AccessPaths, Relation};
use crate::source::Source;
use crate::value::Value;

/// What an [`Estimate`] was derived from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumAsInner)]
pub enum Basis {
    Index { source: usize, prefix_len: usize },
    Degree { constraint: usize },
    Extent,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Estimate {
    /// Tuples per bound tuple.
    pub cardinality: f64,
    pub basis: Basis,
    /// Bound variables the basis relies on.
    pub required: usize,
}

pub struct Estimator<'q> {
    query: &'q QueryGraph,
}

impl<'q> Estimator<'q> {
    pub fn new(query: &'q QueryGraph) -> Self {
        Self { query }
    }

    /// Attributes of `atom` whose variable is bound.
    pub fn bound_attributes(&self, atom: AtomId, bound: &BTreeSet<Var>) -> BTreeSet<&'q str> {
        self.query
            .atom(atom)
            .terms()
            .iter()
            .filter(|(v, _)| bound.contains(v))
            .map(|(_, a)| a.as_str())
            .collect()
    }

    /// Estimates the tuples `atom` yields for `target` given `bound` variables.
    ///
    /// `target` is `None` when every variable of the atom is bound, the atom is then a pure
    /// membership test and yields at most one tuple.
    pub fn estimate(&self, atom: AtomId, target: Option<&Var>, bound: &BTreeSet<Var>) -> Estimate {
        let attributes = self.bound_attributes(atom, bound);
        let target_attribute = target.and_then(|v| self.query.atom(atom).attribute_of(v));

        let mut estimate = self
            .by_index(atom, &attributes)
            .or_else(|| target_attribute.and_then(|t| self.by_degree(atom, &attributes, t)))
            .unwrap_or_else(|| self.by_extent(atom));

        if attributes.len() == self.query.atom(atom).terms().len() {
            estimate.cardinality = estimate.cardinality.min(1.0);
        }

        trace!(
            "Estimated atom {} target {:?} with bound {:?}: {:?}",
            atom,
            target.map(Var::name),
            attributes,
            estimate
        );
        estimate
    }

    /// Size of the whole relation behind `atom`.
    pub fn extent(&self, atom: AtomId) -> f64 {
        self.query.atom(atom).relation().sources()[0].estimate(&[])
    }

    /// Tuples touched by one probe of `atom` without a matching index.
    ///
    /// Uses the longest bound prefix of any source key, or the extent when none is bound.
    pub fn probe_rows(&self, atom: AtomId, bound: &BTreeSet<Var>) -> f64 {
        let attributes = self.bound_attributes(atom, bound);
        let relation = self.query.atom(atom).relation();
        relation
            .sources()
            .iter()
            .enumerate()
            .filter(|(i, _)| relation.serves_lookup(*i))
            .map(|(_, s)| {
                let k = s
                    .access_key()
                    .iter()
                    .take_while(|c| attributes.contains(*c))
                    .count();
                (k, s)
            })
            .filter(|(k, _)| *k > 0)
            .map(|(k, s)| fanout(s.estimate(&[]), s.distinct(k)))
            .min_by(f64::total_cmp)
            .unwrap_or_else(|| self.extent(atom))
    }

    fn by_index(&self, atom: AtomId, attributes: &BTreeSet<&str>) -> Option<Estimate> {
        if attributes.is_empty() {
            return None;
        }
        let k = attributes.len();
        let relation = self.query.atom(atom).relation();
        relation
            .sources()
            .iter()
            .enumerate()
            .filter(|(i, s)| {
                let key = s.access_key();
                relation.serves_lookup(*i)
                    && key.len() >= k && key[..k].iter().all(|c| attributes.contains(c))
            })
            .map(|(i, s)| Estimate {
                cardinality: self.index_fanout(atom, s, k),
                basis: Basis::Index {
                    source: i,
                    prefix_len: k,
                },
                required: k,
            })
            .min_by(|a, b| a.cardinality.total_cmp(&b.cardinality))
    }

    /// Exact count when the prefix is made of query constants, average group size otherwise.
    fn index_fanout(&self, atom: AtomId, source: &Source, k: usize) -> f64 {
        let atom = self.query.atom(atom);
        let constants = source.access_key()[..k]
            .iter()
            .map(|c| {
                atom.terms()
                    .iter()
                    .find(|(_, a)| a == c)
                    .and_then(|(v, _)| self.query.constants().get(v))
                    .cloned()
            })
            .collect::<Option<Vec<Value>>>();

        match constants {
            Some(values) => source.estimate(&values),
            None => fanout(source.estimate(&[]), source.distinct(k)),
        }
    }

    fn by_degree(
        &self,
        atom: AtomId,
        attributes: &BTreeSet<&str>,
        target: &str,
    ) -> Option<Estimate> {
        self.query
            .atom(atom)
            .relation()
            .degree_constraints()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.applies_to(attributes, target))
            .filter_map(|(i, c)| {
                c.upper().map(|upper| Estimate {
                    cardinality: upper as f64,
                    basis: Basis::Degree { constraint: i },
                    required: c.domain().len(),
                })
            })
            .min_by(|a, b| {
                a.cardinality
                    .total_cmp(&b.cardinality)
                    .then(a.required.cmp(&b.required))
            })
    }

    fn by_extent(&self, atom: AtomId) -> Estimate {
        Estimate {
            cardinality: self.extent(atom),
            basis: Basis::Extent,
            required: 0,
        }
    }
}

/// Average group size of `rows` split into `groups`.
fn fanout(rows: f64, groups: f64) -> f64 {
    if groups <= 0.0 {
        0.0
    } else if rows.is_infinite() && groups.is_infinite() {
        1.0
    } else {
        rows / groups
    }
}
