// src/query/values.rs
//
// Untyped filter arguments and the scalar values clauses are built from.
//
// String-dispatched filters (`by("meta_gt", ...)`) receive their arguments
// as `FilterArg`s; each builder checks arity and shape before producing a
// fragment, so a malformed call never reaches the argument set.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single comparable value inside a clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric scalars make metadata comparisons numeric instead of textual
    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// An argument passed to a named filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FilterArg>),
}

impl FilterArg {
    /// The argument as a scalar; `None` for lists
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            FilterArg::Int(i) => Some(Scalar::Int(*i)),
            FilterArg::Float(v) => Some(Scalar::Float(*v)),
            FilterArg::Text(s) => Some(Scalar::Text(s.clone())),
            FilterArg::List(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterArg::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flat list of scalars. A lone scalar counts as a one-element list;
    /// nested lists are rejected.
    pub fn as_scalar_list(&self) -> Option<Vec<Scalar>> {
        match self {
            FilterArg::List(items) => items.iter().map(FilterArg::as_scalar).collect(),
            other => other.as_scalar().map(|s| vec![s]),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FilterArg::List(_))
    }
}

impl From<i64> for FilterArg {
    fn from(v: i64) -> Self {
        FilterArg::Int(v)
    }
}

impl From<i32> for FilterArg {
    fn from(v: i32) -> Self {
        FilterArg::Int(i64::from(v))
    }
}

impl From<u32> for FilterArg {
    fn from(v: u32) -> Self {
        FilterArg::Int(i64::from(v))
    }
}

impl From<f64> for FilterArg {
    fn from(v: f64) -> Self {
        FilterArg::Float(v)
    }
}

impl From<&str> for FilterArg {
    fn from(v: &str) -> Self {
        FilterArg::Text(v.to_string())
    }
}

impl From<String> for FilterArg {
    fn from(v: String) -> Self {
        FilterArg::Text(v)
    }
}

impl From<&String> for FilterArg {
    fn from(v: &String) -> Self {
        FilterArg::Text(v.clone())
    }
}

impl From<Scalar> for FilterArg {
    fn from(v: Scalar) -> Self {
        match v {
            Scalar::Int(i) => FilterArg::Int(i),
            Scalar::Float(f) => FilterArg::Float(f),
            Scalar::Text(s) => FilterArg::Text(s),
        }
    }
}

impl<T: Into<FilterArg>> From<Vec<T>> for FilterArg {
    fn from(v: Vec<T>) -> Self {
        FilterArg::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterArg>, const N: usize> From<[T; N]> for FilterArg {
    fn from(v: [T; N]) -> Self {
        FilterArg::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterArg> + Clone> From<&[T]> for FilterArg {
    fn from(v: &[T]) -> Self {
        FilterArg::List(v.iter().cloned().map(Into::into).collect())
    }
}

/// Builds a `Vec<FilterArg>` from heterogeneous values:
/// `filter_args!["number_meta", 12]`, `filter_args!["genre", ["fict", "hist"]]`.
#[macro_export]
macro_rules! filter_args {
    () => {
        ::std::vec::Vec::<$crate::query::FilterArg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::query::FilterArg::from($arg)),+]
    };
}
