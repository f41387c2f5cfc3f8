use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::relation::{RelationImpl, TableRelation};
use crate::source::{Source, SourceKind};
use crate::storage::{MemoryTable, Storage, TupleIter};
use crate::value::{DataType, Tuple, Value};

pub fn rows(data: &[&[i64]]) -> Vec<Tuple> {
    data.iter()
        .map(|row| row.iter().map(|&v| Value::Int(v)).collect())
        .collect()
}

pub fn table_source(
    data: Vec<Tuple>,
    attributes: &[&str],
    sorted: Vec<usize>,
    position: Option<&str>,
) -> Source {
    let storage = MemoryTable::new(data, sorted.clone(), position.is_some());
    Source::new(
        SourceKind::Table,
        Arc::new(storage),
        position,
        attributes.to_vec(),
        sorted,
    )
    .unwrap()
}

/// Integer relation whose primary source is sorted on the first attribute.
pub fn int_relation(attributes: &[&str], data: &[&[i64]]) -> Arc<RelationImpl> {
    let relation = TableRelation::new(
        attributes.to_vec(),
        vec![DataType::Int; attributes.len()],
        vec![],
        vec![table_source(rows(data), attributes, vec![0], None)],
    )
    .unwrap();
    Arc::new(relation.into())
}

/// Relation fixture in json form.
#[derive(Deserialize)]
pub struct RelationFixture {
    pub attributes: Vec<String>,
    pub types: Vec<String>,
    pub sorted: Vec<usize>,
    pub rows: Vec<Vec<i64>>,
}

pub fn relation_from_json(json: &str) -> Arc<RelationImpl> {
    let fixture: RelationFixture = serde_json::from_str(json).unwrap();
    let types = fixture
        .types
        .iter()
        .map(|t| t.parse::<DataType>().unwrap())
        .collect();
    let data = fixture
        .rows
        .iter()
        .map(|row| row.iter().map(|&v| Value::Int(v)).collect())
        .collect();
    let storage = MemoryTable::new(data, fixture.sorted.clone(), false);
    let source = Source::new(
        SourceKind::Table,
        Arc::new(storage),
        None,
        fixture.attributes.clone(),
        fixture.sorted,
    )
    .unwrap();
    let relation = TableRelation::new(fixture.attributes, types, vec![], vec![source]).unwrap();
    Arc::new(relation.into())
}

/// Storage wrapper counting every call made through it.
#[derive(Debug)]
pub struct CountingStorage<S> {
    inner: S,
    pub calls: std::sync::atomic::AtomicUsize,
}

impl<S> CountingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

impl<S: Storage> Storage for CountingStorage<S> {
    fn estimate(&self, prefix: &[Value]) -> f64 {
        self.count();
        self.inner.estimate(prefix)
    }

    fn scan(&self, prefix: &[Value]) -> TupleIter<'_> {
        self.count();
        self.inner.scan(prefix)
    }

    fn distinct(&self, prefix_len: usize) -> f64 {
        self.count();
        self.inner.distinct(prefix_len)
    }

    fn key(&self) -> &[usize] {
        self.inner.key()
    }

    fn positioned(&self) -> bool {
        self.inner.positioned()
    }

    fn widths(&self) -> &BTreeSet<usize> {
        self.inner.widths()
    }
}
