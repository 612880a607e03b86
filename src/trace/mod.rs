//! Update trace: one record per assignment executed, in evaluation order.

pub mod display;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::ast::{AssignOp, SourceLocation};
use crate::runtime::value::Value;

/// One component of a target path. Indices are 1-based; `Wildcard` means
/// the write applies across every index at that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Index(i64),
    Wildcard,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Wildcard => write!(f, "*"),
        }
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathSegment::Index(i) => serializer.serialize_i64(*i),
            PathSegment::Wildcard => serializer.serialize_str("*"),
        }
    }
}

impl<'de> Deserialize<'de> for PathSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SegmentVisitor;

        impl<'de> Visitor<'de> for SegmentVisitor {
            type Value = PathSegment;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer index or \"*\"")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PathSegment, E> {
                Ok(PathSegment::Index(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PathSegment, E> {
                i64::try_from(v)
                    .map(PathSegment::Index)
                    .map_err(|_| E::custom("index out of range"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PathSegment, E> {
                if v == "*" {
                    Ok(PathSegment::Wildcard)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(SegmentVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub variable: String,
    /// Full target path, wildcards included.
    pub target: Vec<PathSegment>,
    pub op: AssignOp,
    /// Right-hand side of the assignment.
    pub operand: Value,
    /// Value stored at the target after the write.
    pub value: Value,
    pub loc: SourceLocation,
}

impl UpdateRecord {
    pub fn has_wildcard(&self) -> bool {
        self.target.contains(&PathSegment::Wildcard)
    }
}

/// Last write per (variable, target), for consumers that only want final values.
pub fn coalesce(updates: &[UpdateRecord]) -> BTreeMap<(String, Vec<PathSegment>), &UpdateRecord> {
    let mut last = BTreeMap::new();
    for update in updates {
        last.insert((update.variable.clone(), update.target.clone()), update);
    }
    last
}
