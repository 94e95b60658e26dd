// src/query/mod.rs
//
// Query building
//
// Filters become fragments, fragments accumulate in an argument set, the
// argument set lowers to a spec, and the spec compiles into a query the
// result cache memoizes. Nothing in here touches storage directly.

pub mod arguments;
pub mod cache;
pub mod clause;
pub mod clock;
pub mod compiler;
pub mod dates;
pub mod filters;
pub mod registry;
pub mod values;

pub use arguments::{ArgumentSet, CombineStrategy, Fragment, Order, OrderBy, Projection, QueryVars};
pub use cache::{CacheState, ResultCache};
pub use clause::{
    Clause, ClauseValue, Compare, DateBound, DateClause, DateColumn, FieldClause, MetaClause,
    PostField, StatusClause, TaxonomyClause, TermField, TermOperator,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use compiler::{BindValue, CompiledQuery, QueryCompiler, QueryId, QuerySpec};
pub use dates::FilterContext;
pub use filters::Filter;
pub use registry::{FilterBuilder, FilterDefinition, FilterRegistry};
pub use values::{FilterArg, Scalar};
