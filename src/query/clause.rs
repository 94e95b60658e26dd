// src/query/clause.rs
//
// Resolved query clauses
//
// A clause is one predicate of the conjunction a query evaluates. Clauses
// are plain data: they carry no storage knowledge, so any executor can
// translate them. Relative dates are already resolved by the time a clause
// exists.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::values::Scalar;

// ============================================================================
// COMPARISONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compare {
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    Exists,
    NotExists,
    Regexp,
    NotRegexp,
}

impl Compare {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compare::Equals => "equals",
            Compare::NotEquals => "not_equals",
            Compare::Gt => "gt",
            Compare::Gte => "gte",
            Compare::Lt => "lt",
            Compare::Lte => "lte",
            Compare::Like => "like",
            Compare::NotLike => "not_like",
            Compare::In => "in",
            Compare::NotIn => "not_in",
            Compare::Between => "between",
            Compare::NotBetween => "not_between",
            Compare::Exists => "exists",
            Compare::NotExists => "not_exists",
            Compare::Regexp => "regexp",
            Compare::NotRegexp => "not_regexp",
        }
    }

    /// Negated comparisons match values that fail the positive test
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            Compare::NotEquals
                | Compare::NotLike
                | Compare::NotIn
                | Compare::NotBetween
                | Compare::NotExists
                | Compare::NotRegexp
        )
    }

    /// The positive form of a negated comparison (identity otherwise)
    pub fn positive(&self) -> Compare {
        match self {
            Compare::NotEquals => Compare::Equals,
            Compare::NotLike => Compare::Like,
            Compare::NotIn => Compare::In,
            Compare::NotBetween => Compare::Between,
            Compare::NotExists => Compare::Exists,
            Compare::NotRegexp => Compare::Regexp,
            other => *other,
        }
    }

    /// Shape of the value this comparison expects
    pub fn value_shape(&self) -> ValueShape {
        match self {
            Compare::Exists | Compare::NotExists => ValueShape::Nothing,
            Compare::In | Compare::NotIn => ValueShape::List,
            Compare::Between | Compare::NotBetween => ValueShape::Range,
            _ => ValueShape::Single,
        }
    }

    /// Every comparison, in declaration order
    pub fn all() -> &'static [Compare] {
        &[
            Compare::Equals,
            Compare::NotEquals,
            Compare::Gt,
            Compare::Gte,
            Compare::Lt,
            Compare::Lte,
            Compare::Like,
            Compare::NotLike,
            Compare::In,
            Compare::NotIn,
            Compare::Between,
            Compare::NotBetween,
            Compare::Exists,
            Compare::NotExists,
            Compare::Regexp,
            Compare::NotRegexp,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Nothing,
    Single,
    List,
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseValue {
    None,
    One(Scalar),
    Many(Vec<Scalar>),
    Range(Scalar, Scalar),
}

impl ClauseValue {
    pub fn is_numeric(&self) -> bool {
        match self {
            ClauseValue::None => false,
            ClauseValue::One(s) => s.is_numeric(),
            ClauseValue::Many(items) => !items.is_empty() && items.iter().all(Scalar::is_numeric),
            ClauseValue::Range(low, high) => low.is_numeric() && high.is_numeric(),
        }
    }
}

// ============================================================================
// POST FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
}

/// Scalar post fields that can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostField {
    Id,
    Author,
    Parent,
    MenuOrder,
    Title,
    Content,
    Excerpt,
    Slug,
    PostType,
}

impl PostField {
    pub fn all() -> &'static [PostField] {
        &[
            PostField::Id,
            PostField::Author,
            PostField::Parent,
            PostField::MenuOrder,
            PostField::Title,
            PostField::Content,
            PostField::Excerpt,
            PostField::Slug,
            PostField::PostType,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PostField::Id => "id",
            PostField::Author => "author",
            PostField::Parent => "parent",
            PostField::MenuOrder => "menu_order",
            PostField::Title => "title",
            PostField::Content => "content",
            PostField::Excerpt => "excerpt",
            PostField::Slug => "slug",
            PostField::PostType => "post_type",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            PostField::Id | PostField::Author | PostField::Parent | PostField::MenuOrder => {
                FieldKind::Numeric
            }
            _ => FieldKind::Text,
        }
    }

    /// Comparison used by the bare field filter (`by("title", ...)`).
    /// Long-form text is matched by substring, everything else by equality.
    pub fn bare_compare(&self) -> Compare {
        match self {
            PostField::Content | PostField::Excerpt => Compare::Like,
            _ => Compare::Equals,
        }
    }
}

// ============================================================================
// CLAUSES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldClause {
    pub field: PostField,
    pub compare: Compare,
    pub value: ClauseValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaClause {
    pub key: String,
    pub compare: Compare,
    pub value: ClauseValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermField {
    Id,
    Name,
    Slug,
}

impl TermField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermField::Id => "id",
            TermField::Name => "name",
            TermField::Slug => "slug",
        }
    }
}

/// Set semantics of a term filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermOperator {
    /// Any of the terms
    In,
    /// None of the terms
    NotIn,
    /// All of the terms
    And,
}

impl TermOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermOperator::In => "in",
            TermOperator::NotIn => "not_in",
            TermOperator::And => "and",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyClause {
    Exists {
        taxonomy: String,
    },
    NotExists {
        taxonomy: String,
    },
    Terms {
        taxonomy: String,
        field: TermField,
        operator: TermOperator,
        terms: Vec<Scalar>,
    },
}

/// Which timestamp a date clause reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateColumn {
    Local,
    Gmt,
}

impl DateColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateColumn::Local => "local",
            DateColumn::Gmt => "gmt",
        }
    }
}

/// Boundary convention shared by the local and GMT date filters:
/// `date` is inclusive, `after_date` is exclusive, `before_date` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateBound {
    /// `>=`
    AtOrAfter,
    /// `>`
    After,
    /// `<=`
    AtOrBefore,
}

impl DateBound {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateBound::AtOrAfter => "at_or_after",
            DateBound::After => "after",
            DateBound::AtOrBefore => "at_or_before",
        }
    }

    pub fn admits(&self, value: &NaiveDateTime, bound: &NaiveDateTime) -> bool {
        match self {
            DateBound::AtOrAfter => value >= bound,
            DateBound::After => value > bound,
            DateBound::AtOrBefore => value <= bound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateClause {
    pub column: DateColumn,
    pub bound: DateBound,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClause {
    /// No restriction at all, hidden statuses included
    Any,
    OneOf(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    Field(FieldClause),
    Meta(MetaClause),
    Taxonomy(TaxonomyClause),
    Date(DateClause),
    Status(StatusClause),
    /// Exclude posts referenced through any of these meta keys
    NotRelatedTo(Vec<String>),
    /// Substring over title, content and excerpt
    Search(String),
}

impl Clause {
    /// Key under which the clause is stored in an argument set.
    /// Two clauses with the same slot combine; different slots coexist.
    pub fn slot(&self) -> String {
        match self {
            Clause::Field(c) => format!("field:{}:{}", c.field.name(), c.compare.as_str()),
            Clause::Meta(c) => format!("meta:{}:{}", c.key, c.compare.as_str()),
            Clause::Taxonomy(TaxonomyClause::Exists { taxonomy }) => {
                format!("tax:{}:exists", taxonomy)
            }
            Clause::Taxonomy(TaxonomyClause::NotExists { taxonomy }) => {
                format!("tax:{}:not_exists", taxonomy)
            }
            Clause::Taxonomy(TaxonomyClause::Terms {
                taxonomy,
                field,
                operator,
                ..
            }) => format!("tax:{}:{}:{}", taxonomy, field.as_str(), operator.as_str()),
            Clause::Date(c) => format!("date:{}:{}", c.column.as_str(), c.bound.as_str()),
            Clause::Status(_) => "status".to_string(),
            Clause::NotRelatedTo(_) => "not_related_to".to_string(),
            Clause::Search(_) => "search".to_string(),
        }
    }

    /// Mutable access to the list a union/intersect strategy operates on
    pub(crate) fn list_mut(&mut self) -> Option<ListValues<'_>> {
        match self {
            Clause::Field(FieldClause {
                value: ClauseValue::Many(items),
                ..
            })
            | Clause::Meta(MetaClause {
                value: ClauseValue::Many(items),
                ..
            })
            | Clause::Taxonomy(TaxonomyClause::Terms { terms: items, .. }) => {
                Some(ListValues::Scalars(items))
            }
            Clause::NotRelatedTo(keys) => Some(ListValues::Strings(keys)),
            Clause::Status(StatusClause::OneOf(statuses)) => Some(ListValues::Strings(statuses)),
            _ => None,
        }
    }
}

pub(crate) enum ListValues<'a> {
    Scalars(&'a mut Vec<Scalar>),
    Strings(&'a mut Vec<String>),
}
