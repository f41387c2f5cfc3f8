use std::collections::{BTreeSet, HashSet};

use itertools::Itertools;
use log::{debug, warn};

use crate::degree::DegreeConstraint;
use crate::error::{SchemaError, SchemaResult};
use crate::relation::{AccessPath, AccessPaths, Fetch, Lookup, PartialBinding, Relation};
use crate::source::{is_identifier, Source};
use crate::value::DataType;

/// Relation backed by a primary source and optional auxiliary sources.
///
/// The primary source holds every attribute. Auxiliary sources serve as indices: either they
/// hold every attribute in another sorted order, or they hold a leading part of the primary
/// access key, and matching tuples are fetched from the primary source.
#[derive(Debug)]
pub struct TableRelation {
    names: Vec<String>,
    types: Vec<DataType>,
    constraints: Vec<DegreeConstraint>,
    sources: Vec<Source>,
    /// How every source yields relation tuples, `None` for sources no lookup can use.
    readers: Vec<Option<Reader>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Reader {
    /// Source column of every relation attribute.
    Covering(Vec<usize>),
    /// Source columns holding a prefix of the primary access key.
    Locating(Vec<usize>),
}

impl TableRelation {
    pub fn new<S: Into<String>>(
        names: Vec<S>,
        types: Vec<DataType>,
        constraints: Vec<DegreeConstraint>,
        sources: Vec<Source>,
    ) -> SchemaResult<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != types.len() {
            return Err(SchemaError::AttributeCountMismatch {
                names: names.len(),
                types: types.len(),
            });
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !is_identifier(name) {
                return Err(SchemaError::InvalidIdentifier(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateAttribute(name.clone()));
            }
        }

        if sources.is_empty() {
            return Err(SchemaError::EmptySources);
        }

        let primary = &sources[0];
        let missing = names
            .iter()
            .filter(|n| primary.column_index(n).is_none())
            .cloned()
            .collect_vec();
        if !missing.is_empty() {
            return Err(SchemaError::UncoveredAttributes {
                source_index: 0,
                missing,
            });
        }

        let primary_key = primary.access_key();
        let readers = sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let layout = names.iter().map(|n| source.column_index(n)).collect_vec();
                if layout.iter().all(Option::is_some) {
                    return Some(Reader::Covering(layout.into_iter().flatten().collect()));
                }
                let locator = primary_key
                    .iter()
                    .map(|k| source.column_index(k))
                    .while_some()
                    .collect_vec();
                if locator.is_empty() {
                    warn!("Source {} of {:?} can not serve lookups", i, names);
                    None
                } else {
                    Some(Reader::Locating(locator))
                }
            })
            .collect_vec();

        if let Some(unknown) = constraints
            .iter()
            .flat_map(DegreeConstraint::attributes)
            .find(|a| !seen.contains(a.as_str()))
        {
            return Err(SchemaError::UnknownAttribute(unknown.clone()));
        }

        Ok(Self {
            names,
            types,
            constraints,
            sources,
            readers,
        })
    }

    pub fn primary(&self) -> &Source {
        &self.sources[0]
    }

    fn primary_layout(&self) -> Vec<usize> {
        self.names
            .iter()
            .filter_map(|n| self.primary().column_index(n))
            .collect()
    }

    pub(crate) fn attribute_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Picks the source to read for a set of bound attributes.
    ///
    /// An exact prefix match wins, then the longest partial prefix, then the primary source.
    /// Declaration order breaks ties. Sources that can not serve lookups are skipped.
    pub fn access_path(&self, bound: &BTreeSet<&str>) -> AccessPath {
        self.sources
            .iter()
            .enumerate()
            .filter(|(source, _)| self.serves_lookup(*source))
            .map(|(source, s)| {
                let prefix_len = s
                    .access_key()
                    .iter()
                    .take_while(|k| bound.contains(*k))
                    .count();
                AccessPath {
                    source,
                    prefix_len,
                    exact: prefix_len == bound.len(),
                }
            })
            .max_by_key(|p| (p.exact, p.prefix_len, std::cmp::Reverse(p.source)))
            .unwrap_or(AccessPath {
                source: 0,
                prefix_len: 0,
                exact: bound.is_empty(),
            })
    }
}

impl Relation for TableRelation {
    fn attribute_names(&self) -> &[String] {
        &self.names
    }

    fn attribute_types(&self) -> &[DataType] {
        &self.types
    }

    fn degree_constraints(&self) -> &[DegreeConstraint] {
        &self.constraints
    }

    fn lookup(&self, binding: &PartialBinding) -> Lookup<'_> {
        let bound: BTreeSet<&str> = binding
            .keys()
            .map(String::as_str)
            .filter(|name| {
                let known = self.attribute_index(name).is_some();
                if !known {
                    warn!("Ignoring binding of unknown attribute {:?}", name);
                }
                known
            })
            .collect();

        let mut path = self.access_path(&bound);
        let reader = match &self.readers[path.source] {
            Some(reader) => reader.clone(),
            None => {
                path = AccessPath {
                    source: 0,
                    prefix_len: 0,
                    exact: bound.is_empty(),
                };
                Reader::Covering(self.primary_layout())
            }
        };
        let source = &self.sources[path.source];
        let key = source.access_key();
        let prefix = key[..path.prefix_len]
            .iter()
            .map(|k| binding[*k].clone())
            .collect_vec();
        let residual = bound
            .iter()
            .filter(|name| !key[..path.prefix_len].contains(*name))
            .filter_map(|name| {
                source
                    .column_index(name)
                    .map(|c| (c, binding[*name].clone()))
            })
            .collect_vec();

        debug!(
            "Lookup on {:?} reads source {} with {} prefix columns and {} residual filters",
            self.names,
            path.source,
            prefix.len(),
            residual.len()
        );

        let (projection, fetch) = match reader {
            Reader::Covering(layout) => (layout, None),
            Reader::Locating(locator) => {
                let primary = self.primary();
                let residual = bound
                    .iter()
                    .filter_map(|name| {
                        primary
                            .column_index(name)
                            .map(|c| (c, binding[*name].clone()))
                    })
                    .collect_vec();
                let fetch = Fetch {
                    primary,
                    locator,
                    residual,
                };
                (self.primary_layout(), Some(fetch))
            }
        };

        Lookup {
            cardinality: source.estimate(&prefix),
            path,
            source,
            prefix,
            residual,
            projection,
            fetch,
        }
    }
}

impl AccessPaths for TableRelation {
    fn sources(&self) -> &[Source] {
        &self.sources
    }

    fn serves_lookup(&self, source: usize) -> bool {
        matches!(self.readers.get(source), Some(Some(_)))
    }
}
