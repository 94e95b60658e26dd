// src/query/registry.rs
//
// Filter registry
//
// Maps filter names to builders. Every entry declares its combine strategy
// next to the builder, so merge behaviour never depends on how a name is
// spelled. Canonical names and their readable aliases (`meta_gt` and
// `meta_greater_than`) are separate entries sharing one builder.
//
// The registry is built once and shared read-only between repositories;
// registering on a shared registry clones it first (see `ReadRepository`).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::arguments::{CombineStrategy, Fragment};
use super::clause::{
    Compare, DateBound, DateColumn, PostField, TaxonomyClause, TermField, TermOperator,
};
use super::dates::FilterContext;
use super::filters::{
    expect_arity, keys_from_args, status_from_args, strategy_for_compare, text_arg,
    value_for_compare, Filter,
};
use super::values::FilterArg;
use crate::error::{AppError, AppResult};

/// Builds a fragment from untyped arguments. Must be pure given its inputs.
pub type FilterBuilder =
    Arc<dyn Fn(&FilterContext, &[FilterArg]) -> AppResult<Fragment> + Send + Sync>;

#[derive(Clone)]
pub struct FilterDefinition {
    name: String,
    strategy: CombineStrategy,
    builder: FilterBuilder,
}

impl FilterDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> CombineStrategy {
        self.strategy
    }

    /// Runs the builder and stamps the declared strategy on the fragment
    pub fn build(&self, ctx: &FilterContext, args: &[FilterArg]) -> AppResult<Fragment> {
        let mut fragment = (self.builder)(ctx, args)?;
        fragment.strategy = self.strategy;
        Ok(fragment)
    }
}

impl fmt::Debug for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDefinition")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterDefinition>,
}

impl FilterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in filter family
    pub fn with_builtin_filters() -> Self {
        let mut registry = Self::new();
        register_field_filters(&mut registry);
        register_meta_filters(&mut registry);
        register_taxonomy_filters(&mut registry);
        register_date_filters(&mut registry);
        register_misc_filters(&mut registry);
        registry
    }

    /// Adds or replaces a named filter
    pub fn register<F>(&mut self, name: impl Into<String>, strategy: CombineStrategy, builder: F)
    where
        F: Fn(&FilterContext, &[FilterArg]) -> AppResult<Fragment> + Send + Sync + 'static,
    {
        self.register_shared(name, strategy, Arc::new(builder));
    }

    fn register_shared(
        &mut self,
        name: impl Into<String>,
        strategy: CombineStrategy,
        builder: FilterBuilder,
    ) {
        let name = name.into();
        if self.filters.contains_key(&name) {
            log::debug!("filter '{}' re-registered", name);
        }
        self.filters.insert(
            name.clone(),
            FilterDefinition {
                name,
                strategy,
                builder,
            },
        );
    }

    pub fn resolve(&self, name: &str) -> AppResult<&FilterDefinition> {
        self.filters
            .get(name)
            .ok_or_else(|| AppError::UnknownFilter(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}

// ============================================================================
// BUILT-IN FAMILIES
// ============================================================================

/// Suffixes shared by field and meta comparisons: canonical name first,
/// readable aliases after.
const COMPARE_SUFFIXES: &[(Compare, &[&str])] = &[
    (Compare::Equals, &["equals"]),
    (Compare::NotEquals, &["not_equals"]),
    (Compare::Gt, &["gt", "greater_than"]),
    (Compare::Gte, &["gte", "greater_than_or_equal"]),
    (Compare::Lt, &["lt", "less_than"]),
    (Compare::Lte, &["lte", "less_than_or_equal"]),
    (Compare::Like, &["like"]),
    (Compare::NotLike, &["not_like"]),
    (Compare::In, &["in"]),
    (Compare::NotIn, &["not_in"]),
    (Compare::Regexp, &["regexp", "equals_regexp"]),
    (Compare::NotRegexp, &["not_regexp", "not_equals_regexp"]),
    (Compare::Between, &["between"]),
    (Compare::NotBetween, &["not_between"]),
    (Compare::Exists, &["exists"]),
    (Compare::NotExists, &["not_exists"]),
];

fn register_aliases(
    registry: &mut FilterRegistry,
    names: &[String],
    strategy: CombineStrategy,
    builder: FilterBuilder,
) {
    for name in names {
        registry.register_shared(name.clone(), strategy, Arc::clone(&builder));
    }
}

fn register_field_filters(registry: &mut FilterRegistry) {
    for field in PostField::all().iter().copied() {
        for (compare, suffixes) in COMPARE_SUFFIXES {
            let compare = *compare;
            // Fields are always present, so existence checks are meaningless.
            if matches!(compare, Compare::Exists | Compare::NotExists) {
                continue;
            }
            let names: Vec<String> = suffixes
                .iter()
                .map(|suffix| format!("{}_{}", field.name(), suffix))
                .collect();
            let canonical = names[0].clone();
            let builder: FilterBuilder = Arc::new(move |ctx: &FilterContext, args: &[FilterArg]| {
                let value = value_for_compare(&canonical, compare, args)?;
                Filter::field(field, compare, value).into_fragment(&canonical, ctx)
            });
            register_aliases(registry, &names, strategy_for_compare(compare), builder);
        }

        // Bare name: the field's default comparison; a list argument means "any of".
        let bare = field.name().to_string();
        let default_compare = field.bare_compare();
        registry.register(bare.clone(), CombineStrategy::Overwrite, move |ctx, args| {
            expect_arity(&bare, args, 1)?;
            let compare = if args[0].is_list() && default_compare == Compare::Equals {
                Compare::In
            } else {
                default_compare
            };
            let value = value_for_compare(&bare, compare, args)?;
            Filter::field(field, compare, value).into_fragment(&bare, ctx)
        });
    }
}

fn register_meta_filters(registry: &mut FilterRegistry) {
    for (compare, suffixes) in COMPARE_SUFFIXES {
        let compare = *compare;
        let mut names: Vec<String> = suffixes
            .iter()
            .map(|suffix| format!("meta_{}", suffix))
            .collect();
        if compare == Compare::Equals {
            names.insert(0, "meta".to_string());
        }
        let canonical = names[0].clone();
        let builder: FilterBuilder = Arc::new(move |ctx: &FilterContext, args: &[FilterArg]| {
            let (key, rest) = args
                .split_first()
                .ok_or_else(|| AppError::invalid_args(&canonical, "expects a meta key"))?;
            let key = text_arg(&canonical, key, "meta key")?;
            let value = value_for_compare(&canonical, compare, rest)?;
            Filter::meta(key, compare, value).into_fragment(&canonical, ctx)
        });
        register_aliases(registry, &names, strategy_for_compare(compare), builder);
    }
}

fn register_taxonomy_filters(registry: &mut FilterRegistry) {
    registry.register("taxonomy_exists", CombineStrategy::Overwrite, |ctx, args| {
        expect_arity("taxonomy_exists", args, 1)?;
        let taxonomy = text_arg("taxonomy_exists", &args[0], "taxonomy")?;
        Filter::Taxonomy(TaxonomyClause::Exists { taxonomy }).into_fragment("taxonomy_exists", ctx)
    });
    registry.register("taxonomy_not_exists", CombineStrategy::Overwrite, |ctx, args| {
        expect_arity("taxonomy_not_exists", args, 1)?;
        let taxonomy = text_arg("taxonomy_not_exists", &args[0], "taxonomy")?;
        Filter::Taxonomy(TaxonomyClause::NotExists { taxonomy })
            .into_fragment("taxonomy_not_exists", ctx)
    });

    for field in [TermField::Id, TermField::Name, TermField::Slug] {
        for operator in [TermOperator::In, TermOperator::NotIn, TermOperator::And] {
            let name = format!("term_{}_{}", field.as_str(), operator.as_str());
            let strategy = match operator {
                TermOperator::In => CombineStrategy::Intersect,
                TermOperator::NotIn | TermOperator::And => CombineStrategy::Union,
            };
            let filter_name = name.clone();
            registry.register(name, strategy, move |ctx, args| {
                expect_arity(&filter_name, args, 2)?;
                let taxonomy = text_arg(&filter_name, &args[0], "taxonomy")?;
                let terms = args[1].as_scalar_list().ok_or_else(|| {
                    AppError::invalid_args(&filter_name, "expects a term or a flat list of terms")
                })?;
                Filter::terms(taxonomy, field, operator, terms).into_fragment(&filter_name, ctx)
            });
        }
    }
}

fn register_date_filters(registry: &mut FilterRegistry) {
    let variants = [
        ("date", DateBound::AtOrAfter),
        ("after_date", DateBound::After),
        ("before_date", DateBound::AtOrBefore),
    ];
    for (base, bound) in variants {
        for column in [DateColumn::Local, DateColumn::Gmt] {
            let name = match column {
                DateColumn::Local => base.to_string(),
                DateColumn::Gmt => format!("{}_gmt", base),
            };
            let filter_name = name.clone();
            registry.register(name, CombineStrategy::Overwrite, move |ctx, args| {
                expect_arity(&filter_name, args, 1)?;
                let expression = text_arg(&filter_name, &args[0], "date")?;
                Filter::date(column, bound, expression).into_fragment(&filter_name, ctx)
            });
        }
    }
}

fn register_misc_filters(registry: &mut FilterRegistry) {
    registry.register("status", CombineStrategy::Overwrite, |ctx, args| {
        status_from_args("status", args)?.into_fragment("status", ctx)
    });
    registry.register("not_related_to", CombineStrategy::Union, |ctx, args| {
        let keys = keys_from_args("not_related_to", args)?;
        Filter::not_related_to(keys).into_fragment("not_related_to", ctx)
    });
    registry.register("search", CombineStrategy::Overwrite, |ctx, args| {
        expect_arity("search", args, 1)?;
        let text = text_arg("search", &args[0], "search text")?;
        Filter::Search(text).into_fragment("search", ctx)
    });
}
