use std::sync::Arc;

use itertools::Itertools;

use crate::degree::DegreeConstraint;
use crate::error::{SchemaError, SchemaResult};
use crate::relation::{AccessPaths, Lookup, PartialBinding, Relation, TableRelation};
use crate::source::Source;
use crate::value::DataType;

/// A table relation with its attributes in another order.
///
/// The view shares the base relation's sources, so a table sorted on `(a, b)` can be handed to
/// a caller that expects `(b, a)` without copying it. Views are built once and shared, they keep
/// no per query state.
#[derive(Debug)]
pub struct ViewRelation {
    base: Arc<TableRelation>,
    names: Vec<String>,
    types: Vec<DataType>,
    /// View attribute `i` is base attribute `order[i]`.
    order: Vec<usize>,
}

impl ViewRelation {
    pub fn new<S: AsRef<str>>(base: Arc<TableRelation>, order: &[S]) -> SchemaResult<Self> {
        let invalid = || {
            SchemaError::InvalidViewOrder(order.iter().map(|s| s.as_ref().to_string()).collect())
        };

        let indices = order
            .iter()
            .map(|name| base.attribute_index(name.as_ref()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;
        if indices.len() != base.attribute_names().len() || !indices.iter().all_unique() {
            return Err(invalid());
        }

        Ok(Self {
            names: indices
                .iter()
                .map(|&i| base.attribute_names()[i].clone())
                .collect(),
            types: indices.iter().map(|&i| base.attribute_types()[i]).collect(),
            order: indices,
            base,
        })
    }

    pub fn base(&self) -> &Arc<TableRelation> {
        &self.base
    }
}

impl Relation for ViewRelation {
    fn attribute_names(&self) -> &[String] {
        &self.names
    }

    fn attribute_types(&self) -> &[DataType] {
        &self.types
    }

    fn degree_constraints(&self) -> &[DegreeConstraint] {
        self.base.degree_constraints()
    }

    fn lookup(&self, binding: &PartialBinding) -> Lookup<'_> {
        self.base.lookup(binding).permuted(&self.order)
    }
}

impl AccessPaths for ViewRelation {
    fn sources(&self) -> &[Source] {
        self.base.sources()
    }

    fn serves_lookup(&self, source: usize) -> bool {
        self.base.serves_lookup(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{rows, table_source};
    use crate::value::{Tuple, Value};
    use maplit::btreemap;
    use smallvec::smallvec;

    fn base() -> Arc<TableRelation> {
        let relation = TableRelation::new(
            vec!["a", "b"],
            vec![DataType::Int, DataType::Str],
            vec![],
            vec![table_source(rows(&[&[1, 2], &[1, 3], &[2, 2]]), &["a", "b"], vec![0, 1], None)],
        )
        .unwrap();
        Arc::new(relation)
    }

    #[test]
    fn test_view_permutes_tuples() {
        let view = ViewRelation::new(base(), &["b", "a"]).unwrap();
        assert_eq!(&["b", "a"], view.attribute_names());
        assert_eq!(&[DataType::Str, DataType::Int], view.attribute_types());

        let lookup = view.lookup(&btreemap! {"a".to_string() => Value::from(1)});
        assert!(lookup.path().exact);
        let tuples: Vec<Tuple> = lookup.iter().collect();
        let expected: Vec<Tuple> = vec![
            smallvec![Value::from(2), Value::from(1)],
            smallvec![Value::from(3), Value::from(1)],
        ];
        assert_eq!(expected, tuples);
    }

    #[test]
    fn test_view_order_must_be_permutation() {
        for order in [vec!["a"], vec!["a", "a"], vec!["a", "c"]] {
            let err = ViewRelation::new(base(), &order[..]).unwrap_err();
            assert!(matches!(err, SchemaError::InvalidViewOrder(_)));
        }
    }
}
