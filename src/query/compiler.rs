// src/query/compiler.rs
//
// Query compilation
//
// PRINCIPLES:
// - An argument set lowers to a `QuerySpec`: storage-neutral, fully resolved,
//   with pagination and ordering as first-class fields
// - The projection is NOT part of the spec; it is chosen when the query runs
// - A `CompiledQuery` is minted by an executor from a spec. Every compile gets
//   a fresh identity; its fingerprint depends on content alone

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::arguments::{ArgumentSet, Order, OrderBy};
use super::clause::{Clause, StatusClause};
use crate::error::AppResult;

// ============================================================================
// SPEC
// ============================================================================

/// Storage-neutral description of what to fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Conjunction of predicates, status excluded
    pub clauses: Vec<Clause>,
    /// Allowed statuses; `None` means no restriction
    pub statuses: Option<Vec<String>>,
    pub order_by: OrderBy,
    pub order: Order,
    /// Page size; `None` fetches every match
    pub limit: Option<u64>,
    pub skip: u64,
}

impl QuerySpec {
    /// sha256 over the canonical JSON form
    pub fn fingerprint(&self) -> AppResult<String> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

// ============================================================================
// COMPILED QUERY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(Uuid);

impl QueryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A positional parameter of a native statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BindValue {
    Int(i64),
    Real(f64),
    Text(String),
}

/// Executor-ready query. Cloning keeps the identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    id: QueryId,
    fingerprint: String,
    spec: QuerySpec,
    /// Executor-specific predicate text
    statement: String,
    bindings: Vec<BindValue>,
}

impl CompiledQuery {
    pub fn new(spec: QuerySpec, statement: String, bindings: Vec<BindValue>) -> AppResult<Self> {
        let fingerprint = spec.fingerprint()?;
        Ok(Self {
            id: QueryId::new(),
            fingerprint,
            spec,
            statement,
            bindings,
        })
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn bindings(&self) -> &[BindValue] {
        &self.bindings
    }
}

// ============================================================================
// COMPILER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCompiler {
    visible_statuses: Vec<String>,
}

impl QueryCompiler {
    pub fn new<S: Into<String>>(visible_statuses: impl IntoIterator<Item = S>) -> Self {
        Self {
            visible_statuses: visible_statuses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn visible_statuses(&self) -> &[String] {
        &self.visible_statuses
    }

    /// Lowers an effective argument set. Deterministic: equal sets give
    /// equal specs.
    pub fn spec_for(&self, args: &ArgumentSet) -> QuerySpec {
        let mut statuses = Some(self.visible_statuses.clone());
        let mut clauses = Vec::with_capacity(args.len());

        for clause in args.clauses() {
            match clause {
                Clause::Status(StatusClause::Any) => statuses = None,
                Clause::Status(StatusClause::OneOf(list)) => statuses = Some(list.clone()),
                other => clauses.push(other.clone()),
            }
        }

        let vars = args.vars();
        let limit = vars.per_page.flatten().map(u64::from);
        let page = u64::from(vars.page.unwrap_or(1).max(1));
        let skip = match (vars.offset, limit) {
            (Some(offset), _) => offset,
            (None, Some(per_page)) => (page - 1).saturating_mul(per_page),
            (None, None) => 0,
        };

        QuerySpec {
            clauses,
            statuses,
            order_by: vars.order_by.unwrap_or_default(),
            order: vars.order.unwrap_or_default(),
            limit,
            skip,
        }
    }
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new([crate::domain::post::status::PUBLISH])
    }
}
