use anyhow::Context;
use itertools::Itertools;
use relplan::degree::DegreeConstraint;
use relplan::planner::Planner;
use relplan::query::{QueryGraph, Var};
use relplan::relation::{PartialBinding, Relation, RelationImpl, TableRelation};
use relplan::source::{Source, SourceKind};
use relplan::storage::MemoryTable;
use relplan::value::{DataType, Tuple, Value};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Str(String),
}

impl From<&CellValue> for Value {
    fn from(c: &CellValue) -> Self {
        match c {
            CellValue::Int(i) => Value::Int(*i),
            CellValue::Str(s) => Value::Str(s.clone()),
        }
    }
}

#[derive(Deserialize)]
pub struct FunctionalDependency {
    pub domain: Vec<String>,
    pub range: Vec<String>,
}

#[derive(Deserialize)]
pub struct RelationCase {
    pub name: String,
    pub attributes: Vec<String>,
    /// Sorted offsets of every source over the rows, the primary one first.
    pub indexes: Vec<Vec<usize>>,
    #[serde(default)]
    pub functional: Vec<FunctionalDependency>,
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Deserialize)]
pub struct AtomCase {
    pub relation: String,
    /// Variable to attribute.
    pub terms: BTreeMap<String, String>,
}

#[derive(Deserialize)]
pub struct TestCase {
    pub name: String,
    pub relations: Vec<RelationCase>,
    pub atoms: Vec<AtomCase>,
    #[serde(default)]
    pub constants: BTreeMap<String, CellValue>,
    /// Atom groups the first component is cut into, in any order.
    #[serde(default)]
    pub expected_cut: Option<Vec<Vec<usize>>>,
    #[serde(default)]
    pub expected_first: Option<usize>,
    pub expected_answers: usize,
}

pub fn build_relation(case: &RelationCase) -> Arc<RelationImpl> {
    let rows: Vec<Tuple> = case
        .rows
        .iter()
        .map(|row| row.iter().map(Value::from).collect())
        .collect();
    let types = (0..case.attributes.len())
        .map(|c| match rows.first().map(|r| &r[c]) {
            Some(Value::Str(_)) => DataType::Str,
            _ => DataType::Int,
        })
        .collect();
    let sources = case
        .indexes
        .iter()
        .map(|sorted| {
            let storage = MemoryTable::new(rows.clone(), sorted.clone(), false);
            Source::new(
                SourceKind::Table,
                Arc::new(storage),
                None,
                case.attributes.clone(),
                sorted.clone(),
            )
            .unwrap()
        })
        .collect();
    let constraints = case
        .functional
        .iter()
        .map(|fd| DegreeConstraint::functional(fd.domain.clone(), fd.range.clone()).unwrap())
        .collect();
    let relation =
        TableRelation::new(case.attributes.clone(), types, constraints, sources).unwrap();
    Arc::new(relation.into())
}

pub fn build_query(case: &TestCase) -> QueryGraph {
    let relations: HashMap<&str, Arc<RelationImpl>> = case
        .relations
        .iter()
        .map(|r| (r.name.as_str(), build_relation(r)))
        .collect();

    let mut query = QueryGraph::new();
    for atom in &case.atoms {
        let relation = relations
            .get(atom.relation.as_str())
            .cloned()
            .with_context(|| format!("Unknown relation {} in {}", atom.relation, case.name))
            .unwrap();
        query
            .add_atom(relation, atom.terms.iter().map(|(v, a)| (v.as_str(), a.as_str())))
            .unwrap();
    }
    for (var, value) in &case.constants {
        query.bind(var.as_str(), Value::from(value));
    }
    query
}

/// Answers of `query` by checking every combination of tuples, sorted over `vars`.
pub fn brute_force(query: &QueryGraph, vars: &[Var]) -> Vec<Tuple> {
    let extents = query
        .atoms()
        .iter()
        .map(|atom| {
            atom.relation()
                .lookup(&PartialBinding::new())
                .iter()
                .collect_vec()
        })
        .collect_vec();

    let mut answers = BTreeSet::new();
    for combination in extents.iter().map(|e| e.iter()).multi_cartesian_product() {
        let mut assignment: BTreeMap<&Var, &Value> = query.constants().iter().collect();
        let consistent = query.atoms().iter().zip(&combination).all(|(atom, tuple)| {
            let names = atom.relation().attribute_names();
            atom.terms().iter().all(|(var, attribute)| {
                let value = &tuple[names.iter().position(|n| n == attribute).unwrap()];
                *assignment.entry(var).or_insert(value) == value
            })
        });
        if consistent {
            answers.insert(
                vars.iter()
                    .map(|v| assignment[v].clone())
                    .collect::<Tuple>(),
            );
        }
    }
    answers.into_iter().collect()
}

pub struct TestCaseRunner {
    /// Input file path.
    pub paths: Vec<PathBuf>,
    pub planner: Planner,
}

impl TestCaseRunner {
    pub fn run(self) {
        for path in &self.paths {
            let file = File::options()
                .read(true)
                .open(path)
                .with_context(|| format!("Failed to open test case file: {:?}", &path))
                .unwrap();

            let test_cases: Vec<TestCase> = serde_yaml::from_reader(file)
                .with_context(|| format!("Failed to load test cases from file: {:?}", &path))
                .unwrap();

            for test_case in test_cases {
                self.run_case(path, test_case);
            }
        }
    }

    fn run_case<P: AsRef<Path> + Debug>(&self, path: &P, test_case: TestCase) {
        let query = build_query(&test_case);
        let plan = self.planner.plan(&query);

        let mut atoms = plan.order();
        atoms.sort_unstable();
        assert_eq!(
            (0..query.atoms().len()).collect_vec(),
            atoms,
            "Plan for {} in {:?} does not resolve every atom once.",
            test_case.name,
            path
        );

        if let Some(first) = test_case.expected_first {
            assert_eq!(
                Some(first),
                plan.order().first().copied(),
                "Plan for {} in {:?} starts elsewhere.",
                test_case.name,
                path
            );
        }

        if let Some(expected) = &test_case.expected_cut {
            let cut = plan.components()[0]
                .cut
                .as_ref()
                .with_context(|| format!("Plan for {} has no cut", test_case.name))
                .unwrap();
            let groups: BTreeSet<Vec<usize>> =
                cut.components.iter().map(|c| c.atoms.clone()).collect();
            assert_eq!(
                expected.iter().cloned().collect::<BTreeSet<_>>(),
                groups,
                "Cut for {} in {:?} is different.",
                test_case.name,
                path
            );
        }

        let vars = query.vars().into_iter().cloned().collect_vec();
        let answers = self.planner.evaluate(&query);
        let expected = brute_force(&query, &vars);
        assert_eq!(
            test_case.expected_answers,
            expected.len(),
            "Fixture {} in {:?} has a different answer count.",
            test_case.name,
            path
        );
        assert_eq!(
            expected,
            answers.tuples(&vars),
            "Answers for {} in {:?} are different.",
            test_case.name,
            path
        );
    }
}
