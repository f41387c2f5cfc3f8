//! ## Background
//!
//! A conjunctive query joins a list of atoms, each one an occurrence of a relation whose
//! attributes are bound to query variables. The order in which atoms are resolved decides how
//! many intermediate tuples are produced, so the planner orders them by estimated cardinality.
//!
//! Estimates come from what each relation declares about itself: sorted prefixes of its
//! sources, which can be bisected and counted, and degree constraints, which bound how many
//! tuples agree with a given set of attribute values [2]. Sources are never scanned to produce
//! an estimate.
//!
//! The search is greedy in the spirit of [1]: at every step the cheapest atom anywhere on the
//! frontier is resolved next. When the remaining atoms stop sharing unbound variables they are
//! planned as independent components, as in the decomposition of [3].
//!
//!
//! ## Design
//!
//! * [`value`] Attribute values and data types.
//! * [`storage`] In memory tables and streams behind the [`storage::Storage`] trait.
//! * [`source`] Sources with sorted prefixes and position columns.
//! * [`degree`] Degree constraints.
//! * [`relation`] Table and view relations, and the lookup operation.
//! * [`query`] Query graphs and their connected components.
//! * [`estimate`] Cardinality estimation.
//! * [`cost`] Join strategy cost model and calibration.
//! * [`planner`] Greedy join ordering.
//! * [`plan`] Plans and their explain output.
//! * [`exec`] Plan execution.
//! * [`config`] Planner configuration.
//!
//! ## Reference
//!
//! 1. Selinger, P. Griffiths, et al. "Access path selection in a relational database management
//! system." Readings in Artificial Intelligence and Databases. Morgan Kaufmann, 1989. 511-522.
//! 2. Abo Khamis, M., Ngo, H.Q. and Suciu, D., 2017. What do Shannon-type inequalities,
//! submodular width, and disjunctive datalog have to do with one another? In Proceedings of
//! the 36th ACM SIGMOD-SIGACT-SIGAI Symposium on Principles of Database Systems (pp. 429-444).
//! 3. Yannakakis, M., 1981. Algorithms for acyclic database schemes. In VLDB (Vol. 81, pp. 82-94).

pub mod config;
pub mod cost;
pub mod degree;
pub mod error;
pub mod estimate;
pub mod exec;
pub mod plan;
pub mod planner;
pub mod query;
pub mod relation;
pub mod source;
pub mod storage;
pub mod value;

#[cfg(test)]
mod test_utils;
