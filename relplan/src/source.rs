//! Source descriptors.
//!
//! A source is one access path to the rows of a relation: either a table, which can be bisected
//! on its sorted prefix, or a stream, which can only be read front to back.
//!
//! A table declaring sorted prefix offsets `[o1, .., ok]` can be bisected on any leading part
//! of those attributes, and every other attribute is sorted within a group of equal prefixes.
//! A position column grows in stored order, so a table with one is also an index on
//! `(any sorted prefix, position)` at no extra cost.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use strum_macros::{AsRefStr, EnumString};

use crate::error::{SchemaError, SchemaResult};
use crate::storage::{Storage, TupleIter};
use crate::value::Value;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    Table,
    Stream,
}

#[derive(Clone)]
pub struct Source {
    kind: SourceKind,
    data: Arc<dyn Storage>,
    position: Option<String>,
    attributes: Vec<String>,
    sorted: Vec<usize>,
}

impl Source {
    pub fn new<S: Into<String>>(
        kind: SourceKind,
        data: Arc<dyn Storage>,
        position: Option<S>,
        attributes: Vec<S>,
        sorted: Vec<usize>,
    ) -> SchemaResult<Self> {
        let position = position.map(Into::into);
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();

        let mut seen = HashSet::with_capacity(attributes.len() + 1);
        for name in attributes.iter().chain(position.iter()) {
            if !is_identifier(name) {
                return Err(SchemaError::InvalidIdentifier(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateAttribute(name.clone()));
            }
        }

        let increasing = sorted.windows(2).all(|w| w[0] < w[1]);
        let in_range = sorted.iter().all(|&o| o < attributes.len());
        if !increasing || !in_range {
            return Err(SchemaError::InvalidSortedPrefix {
                offsets: sorted,
                arity: attributes.len(),
            });
        }
        if kind == SourceKind::Stream && !sorted.is_empty() {
            return Err(SchemaError::SortedStream(sorted));
        }
        if data.key() != sorted.as_slice() {
            return Err(SchemaError::StorageKeyMismatch {
                stored: data.key().to_vec(),
                sorted,
            });
        }
        if data.positioned() != position.is_some() {
            return Err(SchemaError::PositionMismatch {
                declared: position.is_some(),
            });
        }
        if data.widths().iter().any(|&w| w != attributes.len()) {
            return Err(SchemaError::RowWidthMismatch {
                arity: attributes.len(),
                widths: data.widths().iter().copied().collect(),
            });
        }

        Ok(Self {
            kind,
            data,
            position,
            attributes,
            sorted,
        })
    }

    /// Like [`Source::new`], with the kind given as its tag, `"table"` or `"stream"`.
    pub fn parse<S: Into<String>>(
        kind: &str,
        data: Arc<dyn Storage>,
        position: Option<S>,
        attributes: Vec<S>,
        sorted: Vec<usize>,
    ) -> SchemaResult<Self> {
        let kind = SourceKind::from_str(kind)
            .map_err(|_| SchemaError::UnknownSourceKind(kind.to_string()))?;
        Self::new(kind, data, position, attributes, sorted)
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn data(&self) -> &Arc<dyn Storage> {
        &self.data
    }

    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn sorted_prefix(&self) -> &[usize] {
        &self.sorted
    }

    pub fn sorted_len(&self) -> usize {
        self.sorted.len()
    }

    /// Columns of scanned tuples: the attributes, then the position if any.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .chain(self.position.iter())
            .map(String::as_str)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().position(|c| c == name)
    }

    /// Columns that can be bisected, in bisection order.
    pub fn access_key(&self) -> Vec<&str> {
        self.sorted
            .iter()
            .map(|&o| self.attributes[o].as_str())
            .chain(self.position.as_deref())
            .collect()
    }

    pub fn estimate(&self, prefix: &[Value]) -> f64 {
        self.data.estimate(prefix)
    }

    pub fn scan(&self, prefix: &[Value]) -> TupleIter<'_> {
        self.data.scan(prefix)
    }

    pub fn distinct(&self, prefix_len: usize) -> f64 {
        self.data.distinct(prefix_len)
    }
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Source");
        s.field("kind", &self.kind.as_ref())
            .field("attributes", &self.attributes);
        if let Some(position) = &self.position {
            s.field("position", position);
        }
        s.field("sorted", &self.sorted).finish()
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStream, MemoryTable};
    use crate::test_utils::rows;

    fn empty_table(key: Vec<usize>, position: bool) -> Arc<dyn Storage> {
        Arc::new(MemoryTable::new(vec![], key, position))
    }

    #[test]
    fn test_accessors_round_trip() {
        let data = empty_table(vec![0, 2], true);
        let source = Source::new(
            SourceKind::Table,
            data.clone(),
            Some("pos"),
            vec!["a", "b", "c"],
            vec![0, 2],
        )
        .unwrap();

        assert_eq!(SourceKind::Table, source.kind());
        assert!(Arc::ptr_eq(&data, source.data()));
        assert_eq!(Some("pos"), source.position());
        assert_eq!(&["a", "b", "c"], source.attributes());
        assert_eq!(&[0, 2], source.sorted_prefix());
        assert_eq!(2, source.sorted_len());
        assert_eq!(vec!["a", "c", "pos"], source.access_key());
        assert_eq!(Some(3), source.column_index("pos"));
    }

    #[test]
    fn test_unknown_kind() {
        let err = Source::parse("view", empty_table(vec![], false), None, vec!["a"], vec![])
            .unwrap_err();
        assert_eq!(SchemaError::UnknownSourceKind("view".to_string()), err);
        let stream: Arc<dyn Storage> = Arc::new(MemoryStream::new(vec![], false));
        assert!(Source::parse("stream", stream, None, vec!["a"], vec![]).is_ok());
    }

    #[test]
    fn test_duplicate_names() {
        let err = Source::new(
            SourceKind::Table,
            empty_table(vec![], false),
            None,
            vec!["a", "a"],
            vec![],
        )
        .unwrap_err();
        assert_eq!(SchemaError::DuplicateAttribute("a".to_string()), err);

        let err = Source::new(
            SourceKind::Table,
            empty_table(vec![], true),
            Some("b"),
            vec!["a", "b"],
            vec![],
        )
        .unwrap_err();
        assert_eq!(SchemaError::DuplicateAttribute("b".to_string()), err);
    }

    #[test]
    fn test_invalid_identifier() {
        let err = Source::new(
            SourceKind::Table,
            empty_table(vec![], false),
            None,
            vec!["1a"],
            vec![],
        )
        .unwrap_err();
        assert_eq!(SchemaError::InvalidIdentifier("1a".to_string()), err);
    }

    #[test]
    fn test_bad_sorted_prefix() {
        for sorted in [vec![1, 0], vec![0, 0], vec![3]] {
            let err = Source::new(
                SourceKind::Table,
                empty_table(sorted.clone(), false),
                None,
                vec!["a", "b", "c"],
                sorted.clone(),
            )
            .unwrap_err();
            assert_eq!(
                SchemaError::InvalidSortedPrefix {
                    offsets: sorted,
                    arity: 3
                },
                err
            );
        }
    }

    #[test]
    fn test_storage_must_match_declaration() {
        let unsorted: Arc<dyn Storage> =
            Arc::new(MemoryTable::new(rows(&[&[1, 2], &[3, 4]]), vec![], false));
        let err = Source::new(
            SourceKind::Table,
            unsorted,
            None,
            vec!["a", "b"],
            vec![0],
        )
        .unwrap_err();
        assert_eq!(
            SchemaError::StorageKeyMismatch {
                sorted: vec![0],
                stored: vec![]
            },
            err
        );

        let narrow: Arc<dyn Storage> =
            Arc::new(MemoryTable::new(rows(&[&[1], &[3, 4]]), vec![0], false));
        let err = Source::new(SourceKind::Table, narrow, None, vec!["a", "b"], vec![0])
            .unwrap_err();
        assert_eq!(
            SchemaError::RowWidthMismatch {
                arity: 2,
                widths: vec![1, 2]
            },
            err
        );

        let err = Source::new(
            SourceKind::Table,
            empty_table(vec![0], false),
            Some("pos"),
            vec!["a"],
            vec![0],
        )
        .unwrap_err();
        assert_eq!(SchemaError::PositionMismatch { declared: true }, err);

        let positioned: Arc<dyn Storage> = Arc::new(MemoryStream::new(vec![], true));
        let err = Source::new(SourceKind::Stream, positioned, None, vec!["a"], vec![])
            .unwrap_err();
        assert_eq!(SchemaError::PositionMismatch { declared: false }, err);
    }

    #[test]
    fn test_stream_access_key_is_position_only() {
        let data: Arc<dyn Storage> = Arc::new(MemoryStream::new(vec![], true));
        let source =
            Source::new(SourceKind::Stream, data.clone(), Some("line"), vec!["a"], vec![]).unwrap();
        assert_eq!(vec!["line"], source.access_key());

        let err = Source::new(SourceKind::Stream, data, None, vec!["a"], vec![0]).unwrap_err();
        assert_eq!(SchemaError::SortedStream(vec![0]), err);
    }
}
