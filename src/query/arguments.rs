// src/query/arguments.rs
//
// Argument accumulation
//
// RULES:
// - An argument set is a conjunction: every stored clause must hold
// - Clauses are keyed by slot; a new fragment at an occupied slot combines
//   with the stored clause according to the fragment's strategy
// - Query variables (pagination, ordering, projection) are optional so a
//   set can be layered over defaults: the caller's value wins when present
// - Merging never fails; validation happens before a fragment exists

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::clause::{Clause, ListValues};

// ============================================================================
// FRAGMENTS
// ============================================================================

/// How a fragment combines with a clause already stored at its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineStrategy {
    /// The later clause replaces the earlier one
    Overwrite,
    /// List values are unioned (order of first appearance kept)
    Union,
    /// List values are intersected (order of the earlier list kept)
    Intersect,
}

/// One filter call's contribution to an argument set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub slot: String,
    pub strategy: CombineStrategy,
    pub clause: Clause,
}

impl Fragment {
    /// A fragment stored at the clause's natural slot
    pub fn new(clause: Clause, strategy: CombineStrategy) -> Self {
        Self {
            slot: clause.slot(),
            strategy,
            clause,
        }
    }

    /// Stores the clause under a caller-chosen slot, for custom filters
    /// that must not collide with built-in ones
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }
}

// ============================================================================
// QUERY VARIABLES
// ============================================================================

/// Output shape of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    Ids,
    #[default]
    Objects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    Id,
    #[default]
    Date,
    Title,
    MenuOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

/// Pagination, ordering and projection. `None` defers to the layer below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryVars {
    /// 1-based page
    pub page: Option<u32>,
    /// Page size; `Some(None)` explicitly asks for every result
    pub per_page: Option<Option<u32>>,
    /// Rows to skip; overrides the page-derived offset
    pub offset: Option<u64>,
    pub order_by: Option<OrderBy>,
    pub order: Option<Order>,
    pub fields: Option<Projection>,
}

impl QueryVars {
    /// `self` layered over `below`
    pub fn overlay(&self, below: &QueryVars) -> QueryVars {
        QueryVars {
            page: self.page.or(below.page),
            per_page: self.per_page.or(below.per_page),
            offset: self.offset.or(below.offset),
            order_by: self.order_by.or(below.order_by),
            order: self.order.or(below.order),
            fields: self.fields.or(below.fields),
        }
    }
}

// ============================================================================
// ARGUMENT SET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArgumentSet {
    fragments: BTreeMap<String, Fragment>,
    vars: QueryVars,
}

impl ArgumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combines a fragment into the set according to its strategy
    pub fn merge(&mut self, fragment: Fragment) {
        match self.fragments.get_mut(&fragment.slot) {
            Some(existing) => combine(existing, fragment),
            None => {
                self.fragments.insert(fragment.slot.clone(), fragment);
            }
        }
    }

    /// Builder-style `merge`
    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.merge(fragment);
        self
    }

    pub fn vars(&self) -> &QueryVars {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut QueryVars {
        &mut self.vars
    }

    pub fn with_vars(mut self, vars: QueryVars) -> Self {
        self.vars = vars;
        self
    }

    /// Clauses in slot order
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.fragments.values().map(|f| &f.clause)
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.values()
    }

    pub fn get(&self, slot: &str) -> Option<&Clause> {
        self.fragments.get(slot).map(|f| &f.clause)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.vars == QueryVars::default()
    }

    /// Drops every clause and variable
    pub fn reset_to_defaults(&mut self) {
        self.fragments.clear();
        self.vars = QueryVars::default();
    }

    /// `self` applied on top of `defaults`, as if every default fragment had
    /// been merged first and every fragment of `self` afterwards
    pub fn layered_over(&self, defaults: &ArgumentSet) -> ArgumentSet {
        let mut layered = defaults.clone();
        for fragment in self.fragments.values() {
            layered.merge(fragment.clone());
        }
        layered.vars = self.vars.overlay(&defaults.vars);
        layered
    }

    /// Immutable copy usable as a cache key
    pub fn snapshot(&self) -> ArgumentSet {
        self.clone()
    }

    /// Equality ignoring the projection, which never affects what matches
    pub fn same_query_as(&self, other: &ArgumentSet) -> bool {
        let mut left = self.vars;
        let mut right = other.vars;
        left.fields = None;
        right.fields = None;
        left == right && self.fragments == other.fragments
    }
}

fn combine(existing: &mut Fragment, incoming: Fragment) {
    match incoming.strategy {
        CombineStrategy::Overwrite => *existing = incoming,
        CombineStrategy::Union | CombineStrategy::Intersect => {
            let strategy = incoming.strategy;
            let mut incoming_clause = incoming.clause;
            let combined = match (existing.clause.list_mut(), incoming_clause.list_mut()) {
                (Some(ListValues::Scalars(current)), Some(ListValues::Scalars(extra))) => {
                    combine_lists(current, std::mem::take(extra), strategy);
                    true
                }
                (Some(ListValues::Strings(current)), Some(ListValues::Strings(extra))) => {
                    combine_lists(current, std::mem::take(extra), strategy);
                    true
                }
                _ => false,
            };
            if !combined {
                // Shapes differ (e.g. a custom filter reused a slot): last write wins.
                existing.clause = incoming_clause;
                existing.strategy = strategy;
            }
        }
    }
}

fn combine_lists<T: PartialEq>(current: &mut Vec<T>, extra: Vec<T>, strategy: CombineStrategy) {
    match strategy {
        CombineStrategy::Union => {
            for item in extra {
                if !current.contains(&item) {
                    current.push(item);
                }
            }
        }
        CombineStrategy::Intersect => current.retain(|item| extra.contains(item)),
        CombineStrategy::Overwrite => *current = extra,
    }
}
