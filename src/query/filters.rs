// src/query/filters.rs
//
// Typed filters
//
// `Filter` is the compile-time-checked form of every built-in filter
// family. The string registry parses untyped `FilterArg`s into a `Filter`
// and then goes through the same `into_fragment` path, so both entry points
// validate identically.

use regex::Regex;

use super::arguments::{CombineStrategy, Fragment};
use super::clause::{
    Clause, ClauseValue, Compare, DateBound, DateClause, DateColumn, FieldClause, MetaClause,
    PostField, StatusClause, TaxonomyClause, TermField, TermOperator, ValueShape,
};
use super::dates::{resolve_date_expression, FilterContext};
use super::values::{FilterArg, Scalar};
use crate::domain::post::status;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Field(FieldClause),
    Meta(MetaClause),
    Taxonomy(TaxonomyClause),
    /// Unresolved until a `FilterContext` supplies "now"
    Date {
        column: DateColumn,
        bound: DateBound,
        expression: String,
    },
    Status(StatusClause),
    NotRelatedTo(Vec<String>),
    Search(String),
}

impl Filter {
    pub fn field(field: PostField, compare: Compare, value: ClauseValue) -> Self {
        Filter::Field(FieldClause {
            field,
            compare,
            value,
        })
    }

    pub fn meta(key: impl Into<String>, compare: Compare, value: ClauseValue) -> Self {
        Filter::Meta(MetaClause {
            key: key.into(),
            compare,
            value,
        })
    }

    pub fn terms<S: Into<Scalar>>(
        taxonomy: impl Into<String>,
        field: TermField,
        operator: TermOperator,
        terms: impl IntoIterator<Item = S>,
    ) -> Self {
        Filter::Taxonomy(TaxonomyClause::Terms {
            taxonomy: taxonomy.into(),
            field,
            operator,
            terms: terms.into_iter().map(Into::into).collect(),
        })
    }

    pub fn date(column: DateColumn, bound: DateBound, expression: impl Into<String>) -> Self {
        Filter::Date {
            column,
            bound,
            expression: expression.into(),
        }
    }

    /// `["any"]` anywhere in the list lifts the restriction entirely
    pub fn status<S: Into<String>>(statuses: impl IntoIterator<Item = S>) -> Self {
        let statuses: Vec<String> = statuses.into_iter().map(Into::into).collect();
        if statuses.iter().any(|s| s == status::ANY) {
            Filter::Status(StatusClause::Any)
        } else {
            Filter::Status(StatusClause::OneOf(statuses))
        }
    }

    pub fn not_related_to<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Filter::NotRelatedTo(keys.into_iter().map(Into::into).collect())
    }

    /// Strategy used when the filter is applied without going through the
    /// registry. Any-of lists narrow on repeat, none-of and all-of lists grow,
    /// so a repeated call keeps meaning "both calls hold".
    pub fn strategy(&self) -> CombineStrategy {
        match self {
            Filter::Field(FieldClause { compare, .. }) | Filter::Meta(MetaClause { compare, .. }) => {
                strategy_for_compare(*compare)
            }
            Filter::Taxonomy(TaxonomyClause::Terms { operator, .. }) => match operator {
                TermOperator::In => CombineStrategy::Intersect,
                TermOperator::NotIn | TermOperator::And => CombineStrategy::Union,
            },
            Filter::NotRelatedTo(_) => CombineStrategy::Union,
            _ => CombineStrategy::Overwrite,
        }
    }

    /// Validates the filter and resolves it into a fragment
    pub fn into_fragment(self, name: &str, ctx: &FilterContext) -> AppResult<Fragment> {
        let strategy = self.strategy();
        let clause = self.into_clause(name, ctx)?;
        Ok(Fragment::new(clause, strategy))
    }

    fn into_clause(self, name: &str, ctx: &FilterContext) -> AppResult<Clause> {
        match self {
            Filter::Field(clause) => {
                check_value(name, clause.compare, &clause.value)?;
                if clause.compare.value_shape() == ValueShape::Nothing {
                    return Err(AppError::invalid_args(
                        name,
                        "post fields always exist; use a value comparison",
                    ));
                }
                Ok(Clause::Field(clause))
            }
            Filter::Meta(clause) => {
                require_non_empty(name, &clause.key, "meta key")?;
                check_value(name, clause.compare, &clause.value)?;
                Ok(Clause::Meta(clause))
            }
            Filter::Taxonomy(clause) => {
                match &clause {
                    TaxonomyClause::Exists { taxonomy } | TaxonomyClause::NotExists { taxonomy } => {
                        require_non_empty(name, taxonomy, "taxonomy")?;
                    }
                    TaxonomyClause::Terms {
                        taxonomy,
                        field,
                        terms,
                        ..
                    } => {
                        require_non_empty(name, taxonomy, "taxonomy")?;
                        if terms.is_empty() {
                            return Err(AppError::invalid_args(name, "expects at least one term"));
                        }
                        let well_typed = match field {
                            TermField::Id => terms.iter().all(|t| t.as_int().is_some()),
                            TermField::Name | TermField::Slug => {
                                terms.iter().all(|t| t.as_text().is_some())
                            }
                        };
                        if !well_typed {
                            return Err(AppError::invalid_args(
                                name,
                                format!("term {}s must all be of the same kind", field.as_str()),
                            ));
                        }
                    }
                }
                Ok(Clause::Taxonomy(clause))
            }
            Filter::Date {
                column,
                bound,
                expression,
            } => {
                let at = resolve_date_expression(&expression, column, ctx)
                    .map_err(|e| AppError::invalid_args(name, e.to_string()))?;
                Ok(Clause::Date(DateClause { column, bound, at }))
            }
            Filter::Status(clause) => {
                if let StatusClause::OneOf(statuses) = &clause {
                    if statuses.is_empty() || statuses.iter().any(|s| s.trim().is_empty()) {
                        return Err(AppError::invalid_args(
                            name,
                            "expects one or more non-empty statuses",
                        ));
                    }
                }
                Ok(Clause::Status(clause))
            }
            Filter::NotRelatedTo(keys) => {
                if keys.is_empty() || keys.iter().any(|k| k.trim().is_empty()) {
                    return Err(AppError::invalid_args(
                        name,
                        "expects one or more non-empty meta keys",
                    ));
                }
                Ok(Clause::NotRelatedTo(keys))
            }
            Filter::Search(text) => {
                require_non_empty(name, &text, "search text")?;
                Ok(Clause::Search(text))
            }
        }
    }
}

pub fn strategy_for_compare(compare: Compare) -> CombineStrategy {
    match compare {
        Compare::In => CombineStrategy::Intersect,
        Compare::NotIn => CombineStrategy::Union,
        _ => CombineStrategy::Overwrite,
    }
}

fn require_non_empty(name: &str, value: &str, what: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_args(name, format!("{} cannot be empty", what)));
    }
    Ok(())
}

fn check_value(name: &str, compare: Compare, value: &ClauseValue) -> AppResult<()> {
    let shape_ok = matches!(
        (compare.value_shape(), value),
        (ValueShape::Nothing, ClauseValue::None)
            | (ValueShape::Single, ClauseValue::One(_))
            | (ValueShape::List, ClauseValue::Many(_))
            | (ValueShape::Range, ClauseValue::Range(_, _))
    );
    if !shape_ok {
        return Err(AppError::invalid_args(
            name,
            format!("'{}' does not accept {:?}", compare.as_str(), value),
        ));
    }
    if let ClauseValue::Many(items) = value {
        if items.is_empty() {
            return Err(AppError::invalid_args(name, "expects a non-empty list"));
        }
    }
    if matches!(compare, Compare::Regexp | Compare::NotRegexp) {
        let pattern = match value {
            ClauseValue::One(Scalar::Text(p)) => p,
            _ => return Err(AppError::invalid_args(name, "expects a text pattern")),
        };
        Regex::new(pattern)
            .map_err(|e| AppError::invalid_args(name, format!("invalid pattern: {}", e)))?;
    }
    Ok(())
}

// ============================================================================
// ARGUMENT PARSING (string-dispatched filters)
// ============================================================================

/// Exactly `count` arguments
pub fn expect_arity(name: &str, args: &[FilterArg], count: usize) -> AppResult<()> {
    if args.len() != count {
        return Err(AppError::invalid_args(
            name,
            format!("expects {} argument(s), got {}", count, args.len()),
        ));
    }
    Ok(())
}

pub fn text_arg(name: &str, arg: &FilterArg, what: &str) -> AppResult<String> {
    arg.as_text()
        .map(str::to_string)
        .ok_or_else(|| AppError::invalid_args(name, format!("{} must be text", what)))
}

/// Turns the value arguments of a comparison into a clause value
pub fn value_for_compare(name: &str, compare: Compare, args: &[FilterArg]) -> AppResult<ClauseValue> {
    match compare.value_shape() {
        ValueShape::Nothing => {
            expect_arity(name, args, 0)?;
            Ok(ClauseValue::None)
        }
        ValueShape::Single => {
            expect_arity(name, args, 1)?;
            args[0]
                .as_scalar()
                .map(ClauseValue::One)
                .ok_or_else(|| AppError::invalid_args(name, "expects a single value, not a list"))
        }
        ValueShape::List => {
            expect_arity(name, args, 1)?;
            args[0]
                .as_scalar_list()
                .map(ClauseValue::Many)
                .ok_or_else(|| AppError::invalid_args(name, "expects a flat list of values"))
        }
        ValueShape::Range => {
            expect_arity(name, args, 1)?;
            match args[0].as_scalar_list() {
                Some(bounds) if args[0].is_list() && bounds.len() == 2 => {
                    let mut bounds = bounds.into_iter();
                    match (bounds.next(), bounds.next()) {
                        (Some(low), Some(high)) => Ok(ClauseValue::Range(low, high)),
                        _ => Err(AppError::invalid_args(name, "expects a 2-element bound")),
                    }
                }
                _ => Err(AppError::invalid_args(name, "expects a 2-element bound")),
            }
        }
    }
}

/// Statuses from one text or a list of texts
pub fn status_from_args(name: &str, args: &[FilterArg]) -> AppResult<Filter> {
    expect_arity(name, args, 1)?;
    let statuses = args[0]
        .as_scalar_list()
        .and_then(|items| {
            items
                .into_iter()
                .map(|s| s.as_text().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| AppError::invalid_args(name, "expects a status or a list of statuses"))?;
    Ok(Filter::status(statuses))
}

/// Meta keys from any mix of text and list-of-text arguments
pub fn keys_from_args(name: &str, args: &[FilterArg]) -> AppResult<Vec<String>> {
    if args.is_empty() {
        return Err(AppError::invalid_args(name, "expects at least one meta key"));
    }
    let mut keys = Vec::new();
    for arg in args {
        let items = arg
            .as_scalar_list()
            .ok_or_else(|| AppError::invalid_args(name, "meta keys must be text"))?;
        for item in items {
            let key = item
                .as_text()
                .ok_or_else(|| AppError::invalid_args(name, "meta keys must be text"))?;
            if !keys.iter().any(|k: &String| k == key) {
                keys.push(key.to_string());
            }
        }
    }
    Ok(keys)
}
