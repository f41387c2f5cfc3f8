//! Relations over one or more sources.
//!
//! A relation is read through the [`Relation`] capability surface only. Two variants exist: a
//! [`TableRelation`] backed by a primary source plus auxiliary ones, and a [`ViewRelation`]
//! which presents a table relation in another attribute order without copying its storage.
mod table;
pub use table::*;
mod view;
pub use view::*;

use std::collections::BTreeMap;

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use itertools::Itertools;

use crate::degree::DegreeConstraint;
use crate::source::Source;
use crate::storage::TupleIter;
use crate::value::{DataType, Tuple, Value};

/// Values for some attributes of a relation, keyed by attribute name.
pub type PartialBinding = BTreeMap<String, Value>;

#[derive(Debug, EnumAsInner)]
#[enum_dispatch]
pub enum RelationImpl {
    Table(TableRelation),
    View(ViewRelation),
}

#[enum_dispatch(RelationImpl)]
pub trait Relation {
    fn attribute_names(&self) -> &[String];

    fn attribute_types(&self) -> &[DataType];

    fn degree_constraints(&self) -> &[DegreeConstraint];

    /// Tuples agreeing with `binding`, over [`Relation::attribute_names`].
    fn lookup(&self, binding: &PartialBinding) -> Lookup<'_>;
}

/// Access paths of a relation, used for estimation.
#[enum_dispatch(RelationImpl)]
pub trait AccessPaths {
    /// All sources, the primary one first.
    fn sources(&self) -> &[Source];

    /// Whether `source` can answer lookups, either alone or through the primary source.
    fn serves_lookup(&self, source: usize) -> bool;
}

/// Which source a lookup reads, and how many leading key columns it bisects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AccessPath {
    pub source: usize,
    pub prefix_len: usize,
    /// Every bound attribute is part of the bisected prefix.
    pub exact: bool,
}

/// Result of [`Relation::lookup`].
///
/// Tuples are produced lazily, and [`Lookup::iter`] can be called again to restart.
pub struct Lookup<'a> {
    cardinality: f64,
    path: AccessPath,
    source: &'a Source,
    prefix: Vec<Value>,
    /// Bound columns outside the prefix, checked on every tuple.
    residual: Vec<(usize, Value)>,
    /// Source column of every output column, in the primary source when fetching.
    projection: Vec<usize>,
    fetch: Option<Fetch<'a>>,
}

/// Completes rows of a narrow index from the primary source.
pub(crate) struct Fetch<'a> {
    pub(crate) primary: &'a Source,
    /// Index columns holding a prefix of the primary access key.
    pub(crate) locator: Vec<usize>,
    /// Bound primary columns, checked on every fetched tuple.
    pub(crate) residual: Vec<(usize, Value)>,
}

impl<'a> Lookup<'a> {
    /// Estimated number of tuples. Exact when the access path is exact.
    pub fn cardinality(&self) -> f64 {
        self.cardinality
    }

    pub fn path(&self) -> AccessPath {
        self.path
    }

    pub fn iter(&self) -> TupleIter<'_> {
        let rows = self
            .source
            .scan(&self.prefix)
            .filter(move |t| agrees(t, &self.residual));
        let rows: TupleIter<'_> = match &self.fetch {
            None => Box::new(rows),
            Some(fetch) => Box::new(
                rows.map(move |t| fetch.locator.iter().map(|&c| t[c].clone()).collect_vec())
                    .unique()
                    .flat_map(move |key| fetch.primary.scan(&key))
                    .filter(move |t| agrees(t, &fetch.residual)),
            ),
        };
        Box::new(rows.map(move |t| self.projection.iter().map(|&c| t[c].clone()).collect()))
    }

    /// Reorders output columns, output column `i` becomes old column `order[i]`.
    fn permuted(mut self, order: &[usize]) -> Self {
        self.projection = order.iter().map(|&i| self.projection[i]).collect();
        self
    }
}

impl<'a, 'b> IntoIterator for &'b Lookup<'a> {
    type Item = Tuple;
    type IntoIter = Box<dyn Iterator<Item = Tuple> + 'b>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn agrees(tuple: &Tuple, filters: &[(usize, Value)]) -> bool {
    filters.iter().all(|(c, v)| tuple.get(*c) == Some(v))
}
