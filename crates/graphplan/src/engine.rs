//! The query engine.

use std::sync::Arc;
use std::time::Duration;

use graphplan_core::{
    Capabilities, Error as CoreError, Executor, PlanBuilder, QueryPlan, Record, ResultMaterializer,
    TypeMetadata,
};
use graphplan_proto::{QueryRequest, RowSet};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::cache::{PlanCache, PlanFingerprint};
use crate::config::EngineConfig;
use crate::error::Result;

/// Records of a request plus its total count when one was asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    /// Root records with their expanded navigations.
    pub records: Vec<Record>,
    /// Matching root rows before paging.
    pub count: Option<u64>,
}

/// Plans requests, runs them on an executor and rebuilds records.
pub struct QueryEngine<E: Executor> {
    metadata: Arc<TypeMetadata>,
    executor: E,
    config: EngineConfig,
    capabilities: Capabilities,
    cache: PlanCache,
}

impl<E: Executor> QueryEngine<E> {
    /// Create an engine. Backend capabilities are read from the executor
    /// once.
    pub fn new(metadata: Arc<TypeMetadata>, executor: E, config: EngineConfig) -> Self {
        let capabilities = Capabilities::of(&executor);
        let cache = PlanCache::new(config.plan_cache_capacity);
        Self {
            metadata,
            executor,
            config,
            capabilities,
            cache,
        }
    }

    pub fn metadata(&self) -> &TypeMetadata {
        &self.metadata
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &PlanCache {
        &self.cache
    }

    /// Build the plan for a request, reusing a cached plan when the same
    /// request was planned against the current metadata.
    pub fn plan(&self, request: &QueryRequest) -> Result<Arc<QueryPlan>> {
        if self.config.plan_cache_capacity == 0 {
            return Ok(Arc::new(self.builder().build(request)?));
        }

        let fingerprint = PlanFingerprint::of(request)?;
        let generation = self.metadata.generation();
        if let Some(plan) = self.cache.get(&fingerprint, generation) {
            debug!(%fingerprint, "plan cache hit");
            return Ok(plan);
        }

        let plan = Arc::new(self.builder().build(request)?);
        self.cache.insert(fingerprint, Arc::clone(&plan), generation);
        Ok(plan)
    }

    /// Readable form of a request's plan.
    pub fn explain(&self, request: &QueryRequest) -> Result<String> {
        Ok(self.plan(request)?.explain())
    }

    /// Run a request and materialize its records.
    #[instrument(skip(self, request), fields(root = %request.root_type))]
    pub fn query(&self, request: &QueryRequest) -> Result<QueryOutput> {
        let plan = self.plan(request)?;
        let timeout = request.timeout.or(self.config.timeout);

        let row_sets = plan
            .executable_plans()
            .into_iter()
            .map(|part| self.run(part, timeout))
            .collect::<Result<Vec<RowSet>>>()?;
        let records = ResultMaterializer::new(&self.metadata).materialize(&plan, &row_sets)?;

        let count = match &plan.count {
            Some(count_plan) => Some(self.count(count_plan, timeout)?),
            None => None,
        };
        debug!(
            plans = row_sets.len(),
            records = records.len(),
            ?count,
            "query completed"
        );
        Ok(QueryOutput { records, count })
    }

    /// Run a request and convert every root record into `T`.
    pub fn query_as<T: DeserializeOwned>(&self, request: &QueryRequest) -> Result<Vec<T>> {
        let output = self.query(request)?;
        let typed = output
            .records
            .iter()
            .map(Record::deserialize_into)
            .collect::<std::result::Result<Vec<T>, CoreError>>()?;
        Ok(typed)
    }

    fn builder(&self) -> PlanBuilder<'_> {
        PlanBuilder::new(&self.metadata)
            .with_config(self.config.planner.clone())
            .with_capabilities(self.capabilities.clone())
    }

    fn run(&self, plan: &QueryPlan, timeout: Option<Duration>) -> Result<RowSet> {
        let rows = self
            .executor
            .run_plan(plan, &self.config.backend, &self.config.shards, timeout)?;
        Ok(rows)
    }

    fn count(&self, plan: &QueryPlan, timeout: Option<Duration>) -> Result<u64> {
        let rows = self.run(plan, timeout)?;
        let alias = &self.config.planner.count_alias;
        let value = rows.get(0, alias).and_then(|v| v.as_i64()).ok_or_else(|| {
            CoreError::DataInconsistency(format!("count plan returned no '{}' value", alias))
        })?;
        let count = u64::try_from(value)
            .map_err(|_| CoreError::DataInconsistency(format!("negative count {}", value)))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphplan_core::{MemberDef, MemoryExecutor, ScalarType, TypeDescriptor};
    use graphplan_proto::{FilterExpr, Value};

    fn engine(config: EngineConfig) -> QueryEngine<MemoryExecutor> {
        let metadata = TypeMetadata::init(vec![TypeDescriptor::new("Customer")
            .with_table("Customers")
            .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
            .with_member(MemberDef::scalar("Name", ScalarType::String))])
        .unwrap();
        let executor = MemoryExecutor::new();
        for (id, name) in [(1, "Ada"), (2, "Bob"), (3, "Cy")] {
            executor.insert("Customers", [("Id", Value::from(id)), ("Name", Value::from(name))]);
        }
        QueryEngine::new(Arc::new(metadata), executor, config)
    }

    #[test]
    fn test_plan_is_cached() {
        let engine = engine(EngineConfig::default());
        let request = QueryRequest::new("Customer").with_filter(FilterExpr::eq("Name", "Ada"));

        let first = engine.plan(&request).unwrap();
        let second = engine.plan(&request).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.cache().stats().hits(), 1);
        assert_eq!(engine.cache().stats().misses(), 1);
    }

    #[test]
    fn test_cache_disabled() {
        let engine = engine(EngineConfig::default().with_plan_cache_capacity(0));
        let request = QueryRequest::new("Customer");

        let first = engine.plan(&request).unwrap();
        let second = engine.plan(&request).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_count_with_paging() {
        let engine = engine(EngineConfig::default());
        let request = QueryRequest::new("Customer").with_top(1).with_skip(1).with_count();

        let output = engine.query(&request).unwrap();
        assert_eq!(output.count, Some(3));
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].get("Name"), Some(&Value::from("Bob")));
    }
}
