//! Degree constraints.
//!
//! A degree constraint says that for any fixed assignment of the domain attributes, the number
//! of distinct range tuples lies in `[lower, upper]`. A functional dependency is the special
//! case `upper = 1`.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::error::{SchemaError, SchemaResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DegreeConstraint {
    lower: u64,
    /// `None` is unbounded.
    upper: Option<u64>,
    domain: BTreeSet<String>,
    range: BTreeSet<String>,
}

impl DegreeConstraint {
    pub fn new<I, J, S>(lower: u64, upper: Option<u64>, domain: I, range: J) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domain: BTreeSet<String> = domain.into_iter().map(Into::into).collect();
        let range: BTreeSet<String> = range.into_iter().map(Into::into).collect();

        let shared = domain.intersection(&range).cloned().collect_vec();
        if !shared.is_empty() {
            return Err(SchemaError::OverlappingConstraint(shared));
        }
        if let Some(upper) = upper {
            if lower > upper {
                return Err(SchemaError::InvalidBounds { lower, upper });
            }
        }

        Ok(Self {
            lower,
            upper,
            domain,
            range,
        })
    }

    /// `domain` determines at most one `range` tuple.
    pub fn functional<I, J, S>(domain: I, range: J) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(0, Some(1), domain, range)
    }

    /// `key` is unique: it determines every other attribute of the relation.
    pub fn key<I, S>(key: I, attributes: &[String]) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domain: BTreeSet<String> = key.into_iter().map(Into::into).collect();
        let range = attributes
            .iter()
            .filter(|a| !domain.contains(*a))
            .cloned()
            .collect_vec();
        Self::functional(domain, range)
    }

    pub fn lower(&self) -> u64 {
        self.lower
    }

    pub fn upper(&self) -> Option<u64> {
        self.upper
    }

    pub fn domain(&self) -> &BTreeSet<String> {
        &self.domain
    }

    pub fn range(&self) -> &BTreeSet<String> {
        &self.range
    }

    pub fn is_functional(&self) -> bool {
        self.upper == Some(1)
    }

    /// Whether this bounds `target` once `bound` attributes are fixed.
    pub fn applies_to(&self, bound: &BTreeSet<&str>, target: &str) -> bool {
        self.range.contains(target) && self.domain.iter().all(|d| bound.contains(d.as_str()))
    }

    pub(crate) fn attributes(&self) -> impl Iterator<Item = &String> {
        self.domain.iter().chain(self.range.iter())
    }
}

impl Display for DegreeConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}} -> {{{}}} in [{}, ",
            self.domain.iter().join(", "),
            self.range.iter().join(", "),
            self.lower
        )?;
        match self.upper {
            Some(upper) => write!(f, "{}]", upper),
            None => write!(f, "inf)"),
        }
    }
}
