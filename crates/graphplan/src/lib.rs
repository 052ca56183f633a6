//! graphplan - an embedded query engine for entity graphs.
//!
//! [`QueryEngine`] ties the pieces of `graphplan-core` together: it plans a
//! [`QueryRequest`](graphplan_proto::QueryRequest) against the type
//! metadata, runs the resulting plans on an [`Executor`], and rebuilds
//! the rows into [`Record`] trees. Plans are cached per request and
//! metadata generation.
//!
//! ```ignore
//! let engine = QueryEngine::new(metadata, executor, EngineConfig::default());
//! let request = QueryRequest::new("Order")
//!     .expand(ExpandSpec::new("Lines"))
//!     .with_top(10)
//!     .with_count();
//! let output = engine.query(&request)?;
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;

pub use cache::{CacheStats, PlanCache, PlanFingerprint};
pub use config::{EngineConfig, DEFAULT_PLAN_CACHE_CAPACITY};
pub use engine::{QueryEngine, QueryOutput};
pub use error::{Error, Result};

pub use graphplan_core::{
    BackendTarget, Executor, MemoryExecutor, Navigation, PlannerConfig, Record, ShardSet, SplitMode,
    TypeMetadata,
};
pub use graphplan_core as core;
pub use graphplan_proto as proto;
