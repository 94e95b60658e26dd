// src/repositories/read_repository.rs
//
// Fluent read repository
//
// RULES:
// - Filter and pagination calls mutate the argument set and return `&mut Self`
// - A call that fails leaves the argument set exactly as it was
// - Terminal accessors never touch the argument set, only the cache
// - A call that changes what the query matches drops the cache; a call that
//   leaves it unchanged (or only switches the projection) keeps it
// - The executor and the registry are injected, never looked up

use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};

use crate::config::RepositoryConfig;
use crate::domain::{Post, PostId};
use crate::error::AppResult;
use crate::query::{
    ArgumentSet, CacheState, Clock, CombineStrategy, CompiledQuery, Compare, ClauseValue, Filter,
    FilterArg, FilterContext, Fragment, Order, OrderBy, PostField, Projection, QueryCompiler,
    QuerySpec, ResultCache, Scalar, SystemClock,
};
use crate::query::registry::FilterRegistry;

use super::query_executor::QueryExecutor;

/// One result row in the requested projection
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Id(PostId),
    Post(Post),
}

impl Item {
    pub fn id(&self) -> PostId {
        match self {
            Item::Id(id) => *id,
            Item::Post(post) => post.id,
        }
    }

    pub fn as_post(&self) -> Option<&Post> {
        match self {
            Item::Post(post) => Some(post),
            Item::Id(_) => None,
        }
    }

    pub fn into_post(self) -> Option<Post> {
        match self {
            Item::Post(post) => Some(post),
            Item::Id(_) => None,
        }
    }
}

pub struct ReadRepository {
    executor: Arc<dyn QueryExecutor>,
    registry: Arc<FilterRegistry>,
    compiler: QueryCompiler,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    default_args: ArgumentSet,
    args: ArgumentSet,
    cache: ResultCache,
}

impl ReadRepository {
    /// UTC site offset, published posts visible by default
    pub fn new(executor: Arc<dyn QueryExecutor>, registry: Arc<FilterRegistry>) -> Self {
        Self {
            executor,
            registry,
            compiler: QueryCompiler::default(),
            clock: Arc::new(SystemClock),
            offset: Utc.fix(),
            default_args: ArgumentSet::new(),
            args: ArgumentSet::new(),
            cache: ResultCache::new(),
        }
    }

    pub fn with_config(
        executor: Arc<dyn QueryExecutor>,
        registry: Arc<FilterRegistry>,
        config: &RepositoryConfig,
    ) -> AppResult<Self> {
        config.validate()?;
        let mut repository = Self::new(executor, registry);
        repository.compiler = QueryCompiler::new(config.visible_statuses.iter().cloned());
        repository.offset = config.offset()?;
        if let Some(per_page) = config.default_per_page {
            repository.default_args.vars_mut().per_page = Some(Some(per_page));
        }
        Ok(repository)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    fn filter_context(&self) -> FilterContext {
        FilterContext::new(self.clock.now(), self.offset)
    }

    // ========================================================================
    // FILTERS
    // ========================================================================

    /// Applies a registered filter by name
    pub fn by(&mut self, name: &str, args: Vec<FilterArg>) -> AppResult<&mut Self> {
        let fragment = self.build_fragment(name, &args)?;
        self.apply_fragments(vec![fragment]);
        Ok(self)
    }

    /// Applies several filters; if any is rejected none is applied
    pub fn by_args<I, S>(&mut self, filters: I) -> AppResult<&mut Self>
    where
        I: IntoIterator<Item = (S, Vec<FilterArg>)>,
        S: AsRef<str>,
    {
        let fragments = filters
            .into_iter()
            .map(|(name, args)| self.build_fragment(name.as_ref(), &args))
            .collect::<AppResult<Vec<_>>>()?;
        self.apply_fragments(fragments);
        Ok(self)
    }

    /// Applies a typed filter without going through the registry
    pub fn filter(&mut self, filter: Filter) -> AppResult<&mut Self> {
        let fragment = filter.into_fragment("filter", &self.filter_context())?;
        self.apply_fragments(vec![fragment]);
        Ok(self)
    }

    /// Excludes posts referenced from another post's meta under any of `keys`
    pub fn by_not_related_to(&mut self, keys: &[&str]) -> AppResult<&mut Self> {
        let fragment = Filter::not_related_to(keys.iter().copied())
            .into_fragment("not_related_to", &self.filter_context())?;
        self.apply_fragments(vec![fragment]);
        Ok(self)
    }

    pub fn search(&mut self, text: &str) -> AppResult<&mut Self> {
        let fragment = Filter::Search(text.to_string()).into_fragment("search", &self.filter_context())?;
        self.apply_fragments(vec![fragment]);
        Ok(self)
    }

    pub fn in_ids(&mut self, ids: &[PostId]) -> AppResult<&mut Self> {
        self.id_filter("id_in", Compare::In, ids)
    }

    pub fn not_in_ids(&mut self, ids: &[PostId]) -> AppResult<&mut Self> {
        self.id_filter("id_not_in", Compare::NotIn, ids)
    }

    fn id_filter(&mut self, name: &str, compare: Compare, ids: &[PostId]) -> AppResult<&mut Self> {
        let values = ClauseValue::Many(ids.iter().copied().map(Scalar::Int).collect());
        let fragment =
            Filter::field(PostField::Id, compare, values).into_fragment(name, &self.filter_context())?;
        self.apply_fragments(vec![fragment]);
        Ok(self)
    }

    /// Registers a custom filter on this repository only. A registry shared
    /// with other repositories is cloned first.
    pub fn register_filter<F>(&mut self, name: &str, strategy: CombineStrategy, builder: F) -> &mut Self
    where
        F: Fn(&FilterContext, &[FilterArg]) -> AppResult<Fragment> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.registry).register(name, strategy, builder);
        self
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    fn build_fragment(&self, name: &str, args: &[FilterArg]) -> AppResult<Fragment> {
        let definition = self.registry.resolve(name)?;
        definition.build(&self.filter_context(), args)
    }

    fn apply_fragments(&mut self, fragments: Vec<Fragment>) {
        self.update_args(|args| {
            for fragment in fragments {
                args.merge(fragment);
            }
        });
    }

    // ========================================================================
    // PAGINATION, ORDER, PROJECTION
    // ========================================================================

    /// 1-based page
    pub fn page(&mut self, page: u32) -> &mut Self {
        self.update_args(|args| args.vars_mut().page = Some(page.max(1)));
        self
    }

    pub fn per_page(&mut self, per_page: u32) -> &mut Self {
        self.update_args(|args| args.vars_mut().per_page = Some(Some(per_page)));
        self
    }

    /// Removes the page size: every match is returned
    pub fn unpaginated(&mut self) -> &mut Self {
        self.update_args(|args| args.vars_mut().per_page = Some(None));
        self
    }

    /// Rows to skip; wins over the page-derived offset
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.update_args(|args| args.vars_mut().offset = Some(offset));
        self
    }

    pub fn order_by(&mut self, order_by: OrderBy, order: Order) -> &mut Self {
        self.update_args(|args| {
            let vars = args.vars_mut();
            vars.order_by = Some(order_by);
            vars.order = Some(order);
        });
        self
    }

    /// Switches between ids and posts. Never invalidates the cache.
    pub fn fields(&mut self, projection: Projection) -> &mut Self {
        self.args.vars_mut().fields = Some(projection);
        self
    }

    // ========================================================================
    // DEFAULT ARGUMENTS
    // ========================================================================

    pub fn set_default_args(&mut self, defaults: ArgumentSet) -> &mut Self {
        let before = self.effective_args();
        self.default_args = defaults;
        self.invalidate_if_changed(&before);
        self
    }

    pub fn get_default_args(&self) -> &ArgumentSet {
        &self.default_args
    }

    /// Effective arguments: current calls layered over the defaults
    pub fn snapshot(&self) -> ArgumentSet {
        self.effective_args()
    }

    fn effective_args(&self) -> ArgumentSet {
        self.args.layered_over(&self.default_args)
    }

    fn update_args(&mut self, change: impl FnOnce(&mut ArgumentSet)) {
        let before = self.effective_args();
        change(&mut self.args);
        self.invalidate_if_changed(&before);
    }

    fn invalidate_if_changed(&mut self, before: &ArgumentSet) {
        if self.cache.state() == CacheState::Empty {
            return;
        }
        if !self.effective_args().same_query_as(before) {
            log::debug!("arguments changed, dropping cached query");
            self.cache.invalidate();
        }
    }

    fn projection(&self) -> Projection {
        self.effective_args().vars().fields.unwrap_or_default()
    }

    // ========================================================================
    // TERMINAL ACCESSORS
    // ========================================================================

    /// Every row of the current page in the current projection
    pub fn all(&mut self) -> AppResult<Vec<Item>> {
        match self.projection() {
            Projection::Ids => Ok(self.get_ids()?.into_iter().map(Item::Id).collect()),
            Projection::Objects => Ok(self.posts()?.into_iter().map(Item::Post).collect()),
        }
    }

    pub fn get_ids(&mut self) -> AppResult<Vec<PostId>> {
        self.with_cache(|cache, executor, spec| cache.ids(executor, spec))
    }

    /// Hydrated posts regardless of the projection
    pub fn posts(&mut self) -> AppResult<Vec<Post>> {
        self.with_cache(|cache, executor, spec| cache.posts(executor, spec))
    }

    pub fn first(&mut self) -> AppResult<Option<Item>> {
        Ok(self.all()?.into_iter().next())
    }

    pub fn last(&mut self) -> AppResult<Option<Item>> {
        Ok(self.all()?.pop())
    }

    /// 1-based; `None` when out of range
    pub fn nth(&mut self, n: usize) -> AppResult<Option<Item>> {
        if n == 0 {
            return Ok(None);
        }
        Ok(self.all()?.into_iter().nth(n - 1))
    }

    /// Up to `n` rows from the start of the page
    pub fn take(&mut self, n: usize) -> AppResult<Vec<Item>> {
        let mut items = self.all()?;
        items.truncate(n);
        Ok(items)
    }

    /// Matches ignoring pagination
    pub fn found(&mut self) -> AppResult<u64> {
        let projection = self.projection();
        self.with_cache(|cache, executor, spec| cache.found(executor, spec, projection))
    }

    /// Matches on the current page
    pub fn count(&mut self) -> AppResult<u64> {
        let projection = self.projection();
        self.with_cache(|cache, executor, spec| cache.count(executor, spec, projection))
    }

    /// Compiles without executing
    pub fn build_query(&mut self) -> AppResult<CompiledQuery> {
        self.with_cache(|cache, executor, spec| cache.compiled(executor, spec))
    }

    /// The query the cache currently holds, for inspection
    pub fn get_last_built_query(&self) -> Option<&CompiledQuery> {
        self.cache.query()
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Drops the cache and every non-default argument
    pub fn flush(&mut self) -> &mut Self {
        self.args.reset_to_defaults();
        self.cache.invalidate();
        self
    }

    fn with_cache<T>(
        &mut self,
        op: impl FnOnce(&mut ResultCache, &dyn QueryExecutor, &dyn Fn() -> QuerySpec) -> AppResult<T>,
    ) -> AppResult<T> {
        let compiler = &self.compiler;
        let args = &self.args;
        let defaults = &self.default_args;
        let spec = || compiler.spec_for(&args.layered_over(defaults));
        op(&mut self.cache, self.executor.as_ref(), &spec)
    }
}

impl std::fmt::Debug for ReadRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadRepository")
            .field("registry", &self.registry)
            .field("compiler", &self.compiler)
            .field("offset", &self.offset)
            .field("default_args", &self.default_args)
            .field("args", &self.args)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

