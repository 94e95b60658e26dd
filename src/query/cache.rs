// src/query/cache.rs
//
// Result cache
//
// State machine:
//   Empty     -> no compiled query
//   Compiled  -> query built, nothing fetched yet
//   Populated -> page rows fetched; every view is derivable from them
//
// RULES:
// - At most one compile per argument-set version
// - Ids are derived from fetched posts; posts for fetched ids come from
//   `reproject`, never from a second `run`
// - Any executor failure drops back to Empty, nothing partial is kept

use crate::domain::{Post, PostId};
use crate::error::AppResult;
use crate::repositories::query_executor::{QueryExecutor, Rows};

use super::compiler::{CompiledQuery, QuerySpec};
use super::arguments::Projection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Compiled,
    Populated,
}

#[derive(Debug, Default)]
pub struct ResultCache {
    query: Option<CompiledQuery>,
    ids: Option<Vec<PostId>>,
    posts: Option<Vec<Post>>,
    found: Option<u64>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CacheState {
        match (&self.query, &self.ids, &self.posts) {
            (None, _, _) => CacheState::Empty,
            (Some(_), None, None) => CacheState::Compiled,
            _ => CacheState::Populated,
        }
    }

    pub fn query(&self) -> Option<&CompiledQuery> {
        self.query.as_ref()
    }

    /// Back to Empty
    pub fn invalidate(&mut self) {
        if let Some(query) = self.query.take() {
            log::trace!("dropping cached query {}", query.id());
        }
        self.ids = None;
        self.posts = None;
        self.found = None;
    }

    /// Compiles on Empty, reuses otherwise
    pub fn compiled(
        &mut self,
        executor: &dyn QueryExecutor,
        spec: &dyn Fn() -> QuerySpec,
    ) -> AppResult<CompiledQuery> {
        if let Some(query) = &self.query {
            log::trace!("reusing compiled query {}", query.id());
            return Ok(query.clone());
        }

        let query = executor.compile(&spec()).inspect_err(|e| {
            log::warn!("query compile failed: {}", e);
        })?;
        log::debug!(
            "compiled query {} (fingerprint {})",
            query.id(),
            query.fingerprint()
        );
        self.query = Some(query.clone());
        Ok(query)
    }

    pub fn ids(
        &mut self,
        executor: &dyn QueryExecutor,
        spec: &dyn Fn() -> QuerySpec,
    ) -> AppResult<Vec<PostId>> {
        if let Some(ids) = &self.ids {
            return Ok(ids.clone());
        }
        if let Some(posts) = &self.posts {
            let ids: Vec<PostId> = posts.iter().map(|p| p.id).collect();
            self.ids = Some(ids.clone());
            return Ok(ids);
        }

        self.execute(executor, spec, Projection::Ids)?;
        Ok(self.ids.clone().unwrap_or_default())
    }

    pub fn posts(
        &mut self,
        executor: &dyn QueryExecutor,
        spec: &dyn Fn() -> QuerySpec,
    ) -> AppResult<Vec<Post>> {
        if let Some(posts) = &self.posts {
            return Ok(posts.clone());
        }

        if let Some(ids) = self.ids.clone() {
            let query = self.compiled(executor, spec)?;
            log::trace!("re-projecting {} ids of query {}", ids.len(), query.id());
            let posts = match executor.reproject(&query, &ids) {
                Ok(posts) => posts,
                Err(e) => {
                    log::warn!("re-projection of query {} failed: {}", query.id(), e);
                    self.invalidate();
                    return Err(e);
                }
            };
            self.posts = Some(posts.clone());
            return Ok(posts);
        }

        self.execute(executor, spec, Projection::Objects)?;
        Ok(self.posts.clone().unwrap_or_default())
    }

    /// Total matches ignoring pagination.
    ///
    /// On an Empty cache this runs the query with `projection`; the store's
    /// separate count is only asked for when the run did not report one.
    pub fn found(
        &mut self,
        executor: &dyn QueryExecutor,
        spec: &dyn Fn() -> QuerySpec,
        projection: Projection,
    ) -> AppResult<u64> {
        if self.ids.is_none() && self.posts.is_none() {
            self.execute(executor, spec, projection)?;
        }
        if let Some(found) = self.found {
            return Ok(found);
        }

        let query = self.compiled(executor, spec)?;
        match executor.found_count(&query) {
            Ok(found) => {
                self.found = Some(found);
                Ok(found)
            }
            Err(e) => {
                log::warn!("found count failed for query {}: {}", query.id(), e);
                self.invalidate();
                Err(e)
            }
        }
    }

    /// Matches on the current page
    pub fn count(
        &mut self,
        executor: &dyn QueryExecutor,
        spec: &dyn Fn() -> QuerySpec,
        projection: Projection,
    ) -> AppResult<u64> {
        if self.ids.is_none() && self.posts.is_none() {
            self.execute(executor, spec, projection)?;
        }
        let len = match (&self.ids, &self.posts) {
            (Some(ids), _) => ids.len(),
            (None, Some(posts)) => posts.len(),
            (None, None) => 0,
        };
        Ok(len as u64)
    }

    fn execute(
        &mut self,
        executor: &dyn QueryExecutor,
        spec: &dyn Fn() -> QuerySpec,
        projection: Projection,
    ) -> AppResult<()> {
        // A failed compile stores nothing, so the cache is still Empty.
        let query = self.compiled(executor, spec)?;

        let execution = match executor.run(&query, projection) {
            Ok(execution) => execution,
            Err(e) => {
                log::warn!("query {} failed: {}", query.id(), e);
                self.invalidate();
                return Err(e);
            }
        };

        log::debug!(
            "query {} returned {} row(s) as {:?}",
            query.id(),
            execution.rows.len(),
            projection
        );

        match execution.rows {
            Rows::Ids(ids) => self.ids = Some(ids),
            Rows::Posts(posts) => {
                self.ids = Some(posts.iter().map(|p| p.id).collect());
                self.posts = Some(posts);
            }
        }
        if execution.found.is_some() {
            self.found = execution.found;
        }
        Ok(())
    }
}
