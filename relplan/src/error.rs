use thiserror::Error;

pub type RelResult<T> = anyhow::Result<T>;

/// Raised while building sources, degree constraints, relations or query atoms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown source kind {0:?}, expected \"table\" or \"stream\"")]
    UnknownSourceKind(String),
    #[error("{0:?} is not a valid attribute identifier")]
    InvalidIdentifier(String),
    #[error("duplicate attribute name {0:?}")]
    DuplicateAttribute(String),
    #[error("sorted prefix {offsets:?} is not strictly increasing within {arity} attributes")]
    InvalidSortedPrefix { offsets: Vec<usize>, arity: usize },
    #[error("streams can not declare a sorted prefix, got {0:?}")]
    SortedStream(Vec<usize>),
    #[error("sorted prefix {sorted:?} does not match the storage key {stored:?}")]
    StorageKeyMismatch {
        sorted: Vec<usize>,
        stored: Vec<usize>,
    },
    #[error("storage rows have widths {widths:?}, expected {arity}")]
    RowWidthMismatch { arity: usize, widths: Vec<usize> },
    #[error("position column declared: {declared}, but the storage disagrees")]
    PositionMismatch { declared: bool },
    #[error("degree constraint bounds [{lower}, {upper}] are out of order")]
    InvalidBounds { lower: u64, upper: u64 },
    #[error("degree constraint domain and range share {0:?}")]
    OverlappingConstraint(Vec<String>),
    #[error("{names} attribute names but {types} attribute types")]
    AttributeCountMismatch { names: usize, types: usize },
    #[error("relation needs at least one source")]
    EmptySources,
    #[error("source {source_index} does not cover attributes {missing:?}")]
    UncoveredAttributes {
        source_index: usize,
        missing: Vec<String>,
    },
    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),
    #[error("view order {0:?} is not a permutation of the base attributes")]
    InvalidViewOrder(Vec<String>),
    #[error("variable {0:?} is mapped twice in one atom")]
    DuplicateVariable(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;
