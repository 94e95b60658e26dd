// src/repositories/query_executor.rs
//
// Query executor boundary
//
// RULES:
// - `compile` is pure construction, no I/O
// - `run` is the only call that scans the store for matches
// - `reproject` hydrates ids a previous `run` already returned
// - Executors never cache; the repository owns all memoization

use crate::domain::{Post, PostId};
use crate::error::AppResult;
use crate::query::{CompiledQuery, Projection, QuerySpec};

/// Rows of one page, in query order
#[derive(Debug, Clone, PartialEq)]
pub enum Rows {
    Ids(Vec<PostId>),
    Posts(Vec<Post>),
}

impl Rows {
    pub fn len(&self) -> usize {
        match self {
            Rows::Ids(ids) => ids.len(),
            Rows::Posts(posts) => posts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one `run`
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub rows: Rows,
    /// Total matches ignoring pagination, when the executor computed it
    pub found: Option<u64>,
}

#[cfg_attr(test, mockall::automock)]
pub trait QueryExecutor: Send + Sync {
    fn compile(&self, spec: &QuerySpec) -> AppResult<CompiledQuery>;

    fn run(&self, query: &CompiledQuery, projection: Projection) -> AppResult<Execution>;

    /// Hydrates `ids`, keeping their order
    fn reproject(&self, query: &CompiledQuery, ids: &[PostId]) -> AppResult<Vec<Post>>;

    /// Fallback for executors whose `run` does not report `found`
    fn found_count(&self, query: &CompiledQuery) -> AppResult<u64>;
}
