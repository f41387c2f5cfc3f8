use std::collections::{BTreeMap, HashSet};
use std::hint::black_box;
use std::time::Instant;

use itertools::Itertools;
use log::debug;

use crate::cost::CostConstants;
use crate::relation::{PartialBinding, Relation, RelationImpl};
use crate::value::{Tuple, Value};

/// Measures cost constants on a representative relation and probe workload.
///
/// Every constant is expressed in units of the per element cost of sorting the relation, which
/// is the unit of the `L * log2(L)` term. Falls back to the defaults when the relation or the
/// workload is too small to measure.
pub fn calibrate(relation: &RelationImpl, probes: &[PartialBinding]) -> CostConstants {
    let tuples: Vec<Tuple> = relation.lookup(&PartialBinding::new()).iter().collect();
    let n = tuples.len();
    if n < 2 || probes.is_empty() {
        return CostConstants::default();
    }

    let columns = probes[0]
        .keys()
        .filter_map(|k| relation.attribute_names().iter().position(|n| n == k))
        .collect_vec();
    let key_of = |t: &Tuple| -> Vec<Value> { columns.iter().map(|&c| t[c].clone()).collect() };
    let probe_keys = probes
        .iter()
        .map(|p| p.values().cloned().collect_vec())
        .collect_vec();

    let unit = {
        let mut sorted = tuples.clone();
        let start = Instant::now();
        sorted.sort();
        black_box(&sorted);
        start.elapsed().as_secs_f64() / (n as f64 * (n as f64).log2())
    };
    if unit <= 0.0 {
        return CostConstants::default();
    }

    let iterate = {
        let mut touched = 0.0;
        let start = Instant::now();
        for probe in probes {
            let lookup = relation.lookup(probe);
            touched += lookup.cardinality().max(1.0);
            black_box(lookup.iter().count());
        }
        start.elapsed().as_secs_f64() / touched
    };

    let intermediate = {
        let mut index: BTreeMap<Vec<Value>, Vec<&Tuple>> = BTreeMap::new();
        for t in &tuples {
            index.entry(key_of(t)).or_default().push(t);
        }
        let start = Instant::now();
        for key in &probe_keys {
            black_box(index.get(key).map_or(0, Vec::len));
        }
        start.elapsed().as_secs_f64() / probe_keys.len() as f64
    };

    let filter = {
        let members: HashSet<&Vec<Value>> = probe_keys.iter().collect();
        let start = Instant::now();
        let hits = tuples
            .iter()
            .filter(|t| members.contains(&key_of(*t)))
            .count();
        black_box(hits);
        start.elapsed().as_secs_f64() / n as f64
    };

    let constants = CostConstants {
        iterate: iterate / unit,
        intermediate: intermediate / unit,
        filter: filter / unit,
    };
    debug!("Calibrated cost constants over {} tuples: {:?}", n, constants);
    constants
}
