//! Attribute values and tuples.

use derive_more::{Display, From};
use smallvec::SmallVec;
use strum_macros::{Display as StrumDisplay, EnumString};

/// One attribute value. Values are only compared and hashed, never type checked.
#[derive(Clone, Debug, Display, From, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Int(i64),
    #[display(fmt = "{:?}", _0)]
    Str(String),
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

/// Declared attribute type tag.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, EnumString, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum DataType {
    Int,
    Str,
}

pub type Tuple = SmallVec<[Value; 4]>;
