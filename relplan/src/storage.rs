//! The storage boundary.
//!
//! A [`Storage`] is an already open, read-only handle to the rows behind a
//! [`Source`](crate::source::Source). Prefixes passed to it bind the leading columns of the
//! source's access key, see [`Source::access_key`](crate::source::Source::access_key).

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::value::{Tuple, Value};

pub type TupleIter<'a> = Box<dyn Iterator<Item = Tuple> + 'a>;

/// Rows reported by streams, which may never end.
pub const UNBOUNDED: f64 = f64::INFINITY;

pub trait Storage: Debug + Send + Sync {
    /// Number of rows whose access key starts with `prefix`.
    fn estimate(&self, prefix: &[Value]) -> f64;

    /// Rows whose access key starts with `prefix`, in stored order.
    fn scan(&self, prefix: &[Value]) -> TupleIter<'_>;

    /// Number of distinct access key prefixes of length `prefix_len`.
    fn distinct(&self, prefix_len: usize) -> f64;

    /// Column offsets the rows are sorted and bisected on, before any position column.
    fn key(&self) -> &[usize];

    /// Whether scanned rows end with a position value.
    fn positioned(&self) -> bool;

    /// Distinct widths of the stored rows, not counting the position column.
    fn widths(&self) -> &BTreeSet<usize>;
}

/// Sorted in-memory table.
///
/// Rows are kept sorted on the key columns first and the whole row second, so columns outside
/// the key are sorted within every group of equal keys. The position of a row is its index in
/// that order.
#[derive(Debug)]
pub struct MemoryTable {
    rows: Vec<Tuple>,
    key: Vec<usize>,
    position: bool,
    /// `ndv[k]` is the number of distinct key prefixes of length `k`.
    ndv: Vec<f64>,
    widths: BTreeSet<usize>,
}

impl MemoryTable {
    pub fn new(mut rows: Vec<Tuple>, key: Vec<usize>, position: bool) -> Self {
        rows.sort_by(|a, b| {
            key.iter()
                .map(|&c| a.get(c).cmp(&b.get(c)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.cmp(b))
        });
        rows.dedup();

        let mut ndv = Vec::with_capacity(key.len() + 2);
        for len in 0..=key.len() {
            let count = rows
                .windows(2)
                .filter(|w| key[..len].iter().any(|&c| w[0].get(c) != w[1].get(c)))
                .count();
            ndv.push(if rows.is_empty() { 0.0 } else { (count + 1) as f64 });
        }
        if position {
            ndv.push(rows.len() as f64);
        }

        Self {
            widths: rows.iter().map(|r| r.len()).collect(),
            rows,
            key,
            position,
            ndv,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cmp_prefix(&self, row: &Tuple, prefix: &[Value]) -> Ordering {
        self.key
            .iter()
            .zip(prefix)
            .map(|(&c, v)| row.get(c).cmp(&Some(v)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Row index range matching `prefix`.
    fn range(&self, prefix: &[Value]) -> (usize, usize) {
        let (key_part, position) = if prefix.len() > self.key.len() {
            (&prefix[..self.key.len()], prefix.get(self.key.len()))
        } else {
            (prefix, None)
        };

        let lo = self
            .rows
            .partition_point(|row| self.cmp_prefix(row, key_part) == Ordering::Less);
        let hi = self
            .rows
            .partition_point(|row| self.cmp_prefix(row, key_part) != Ordering::Greater);

        match position {
            Some(Value::Int(p)) if self.position => match usize::try_from(*p) {
                Ok(p) if (lo..hi).contains(&p) => (p, p + 1),
                _ => (lo, lo),
            },
            Some(_) => (lo, lo),
            None => (lo, hi),
        }
    }
}

impl Storage for MemoryTable {
    fn estimate(&self, prefix: &[Value]) -> f64 {
        let (lo, hi) = self.range(prefix);
        (hi - lo) as f64
    }

    fn scan(&self, prefix: &[Value]) -> TupleIter<'_> {
        let (lo, hi) = self.range(prefix);
        let position = self.position;
        Box::new(
            self.rows[lo..hi]
                .iter()
                .enumerate()
                .map(move |(i, row)| with_position(row, position, lo + i)),
        )
    }

    fn distinct(&self, prefix_len: usize) -> f64 {
        self.ndv
            .get(prefix_len)
            .copied()
            .unwrap_or(self.rows.len() as f64)
    }

    fn key(&self) -> &[usize] {
        &self.key
    }

    fn positioned(&self) -> bool {
        self.position
    }

    fn widths(&self) -> &BTreeSet<usize> {
        &self.widths
    }
}

/// In-memory stream, readable front to back only.
///
/// Only the position column, which grows in arrival order, can be bisected.
#[derive(Debug)]
pub struct MemoryStream {
    rows: Vec<Tuple>,
    position: bool,
    widths: BTreeSet<usize>,
}

impl MemoryStream {
    pub fn new(rows: Vec<Tuple>, position: bool) -> Self {
        Self {
            widths: rows.iter().map(|r| r.len()).collect(),
            rows,
            position,
        }
    }

    fn range(&self, prefix: &[Value]) -> (usize, usize) {
        match prefix.first() {
            None => (0, self.rows.len()),
            Some(Value::Int(p)) if self.position => match usize::try_from(*p) {
                Ok(p) if p < self.rows.len() => (p, p + 1),
                _ => (0, 0),
            },
            Some(_) => (0, 0),
        }
    }
}

impl Storage for MemoryStream {
    fn estimate(&self, prefix: &[Value]) -> f64 {
        if prefix.is_empty() {
            return UNBOUNDED;
        }
        let (lo, hi) = self.range(prefix);
        (hi - lo) as f64
    }

    fn scan(&self, prefix: &[Value]) -> TupleIter<'_> {
        let (lo, hi) = self.range(prefix);
        let position = self.position;
        Box::new(
            self.rows[lo..hi]
                .iter()
                .enumerate()
                .map(move |(i, row)| with_position(row, position, lo + i)),
        )
    }

    fn distinct(&self, prefix_len: usize) -> f64 {
        match prefix_len {
            0 => 1.0,
            _ => UNBOUNDED,
        }
    }

    fn key(&self) -> &[usize] {
        &[]
    }

    fn positioned(&self) -> bool {
        self.position
    }

    fn widths(&self) -> &BTreeSet<usize> {
        &self.widths
    }
}

fn with_position(row: &Tuple, position: bool, index: usize) -> Tuple {
    let mut tuple = row.clone();
    if position {
        tuple.push(Value::Int(index as i64));
    }
    tuple
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn edges() -> MemoryTable {
        let rows = vec![
            smallvec![Value::from(2), Value::from("b")],
            smallvec![Value::from(1), Value::from("c")],
            smallvec![Value::from(1), Value::from("a")],
            smallvec![Value::from(3), Value::from("a")],
            smallvec![Value::from(1), Value::from("a")],
        ];
        MemoryTable::new(rows, vec![0], true)
    }

    #[test]
    fn test_table_bisects_key_prefix() {
        let table = edges();
        assert_eq!(4, table.len());
        assert_eq!(2.0, table.estimate(&[Value::from(1)]));
        assert_eq!(0.0, table.estimate(&[Value::from(7)]));

        let rows: Vec<Tuple> = table.scan(&[Value::from(1)]).collect();
        let expected: Vec<Tuple> = vec![
            smallvec![Value::from(1), Value::from("a"), Value::from(0)],
            smallvec![Value::from(1), Value::from("c"), Value::from(1)],
        ];
        assert_eq!(expected, rows);
    }

    #[test]
    fn test_table_position_lookup() {
        let table = edges();
        assert_eq!(1.0, table.estimate(&[Value::from(1), Value::from(1)]));
        // Position 2 belongs to key 2, not key 1.
        assert_eq!(0.0, table.estimate(&[Value::from(1), Value::from(2)]));
    }

    #[test]
    fn test_table_distinct_prefixes() {
        let table = edges();
        assert_eq!(1.0, table.distinct(0));
        assert_eq!(3.0, table.distinct(1));
        assert_eq!(4.0, table.distinct(2));
    }

    #[test]
    fn test_narrow_rows_do_not_panic() {
        let rows = vec![smallvec![Value::from(2)], smallvec![Value::from(1), Value::from(5)]];
        let table = MemoryTable::new(rows, vec![1], false);
        assert_eq!(2, table.len());
        assert_eq!(vec![1, 2], table.widths().iter().copied().collect::<Vec<_>>());
        assert_eq!(&[1], table.key());
    }

    #[test]
    fn test_stream_is_unbounded() {
        let stream = MemoryStream::new(
            vec![smallvec![Value::from("x")], smallvec![Value::from("y")]],
            true,
        );
        assert_eq!(UNBOUNDED, stream.estimate(&[]));
        assert_eq!(1.0, stream.estimate(&[Value::from(1)]));
        assert_eq!(2, stream.scan(&[]).count());
        let rows: Vec<Tuple> = stream.scan(&[Value::from(1)]).collect();
        let expected: Vec<Tuple> = vec![smallvec![Value::from("y"), Value::from(1)]];
        assert_eq!(expected, rows);
    }
}
