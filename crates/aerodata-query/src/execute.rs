//! Execution layer.
//!
//! An [`ExecutionContext`] carries everything one execution needs: the
//! registry snapshot (through its validator), the backend adapter, compiler
//! options, the retry policy, and result strictness. Nothing here is global.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use aerodata_config::{AeroDataConfig, CompilerConfig, RetryConfig};
use aerodata_core::{Backend, Entity, MapOptions, RawRecord, Registry, ResultMapper, Validator};

use crate::builder::QueryBuilder;
use crate::error::{BackendExecutionError, CompileError, QueryError, QueryResult};
use crate::mutation::Mutation;
use crate::render::{compiler_for, CompiledQuery, QueryCompiler, QueryKind};

/// Runs compiled queries against a live store.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Backend this adapter talks to
    fn backend(&self) -> Backend;

    /// Execute one compiled query and return its raw records.
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<RawRecord>, BackendExecutionError>;
}

/// Retry an operation with exponential backoff while its error is retryable.
pub async fn retry_with_backoff<'a, T>(
    operation: impl Fn() -> BoxFuture<'a, Result<T, BackendExecutionError>>,
    config: &RetryConfig,
) -> QueryResult<T> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!("Backend attempt {} of {}", attempt, max_attempts);

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!("Operation succeeded on attempt {}", attempt);
                }
                return Ok(result);
            }
            Err(err) => {
                error!("Attempt {} failed: {}", attempt, err);

                if !err.is_retryable() {
                    warn!("Error is not retryable, giving up: {}", err);
                    return Err(QueryError::Execution {
                        attempts: attempt,
                        source: err,
                    });
                }
                if attempt >= max_attempts {
                    error!("All {} attempts failed", max_attempts);
                    return Err(QueryError::Execution {
                        attempts: attempt,
                        source: err,
                    });
                }

                let delay = config.delay_after(attempt);
                debug!("Waiting {:?} before attempt {}", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Explicit per-execution context.
#[derive(Clone)]
pub struct ExecutionContext {
    adapter: Arc<dyn BackendAdapter>,
    compiler: CompilerConfig,
    retry: RetryConfig,
    strict: bool,
    mapper: ResultMapper,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("backend", &self.adapter.backend())
            .field("registry_version", &self.registry().version())
            .field("compiler", &self.compiler)
            .field("retry", &self.retry)
            .field("strict", &self.strict)
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(validator: Validator, adapter: Arc<dyn BackendAdapter>) -> Self {
        Self {
            adapter,
            compiler: CompilerConfig::default(),
            retry: RetryConfig::default(),
            strict: false,
            mapper: ResultMapper::new(validator),
        }
    }

    pub fn from_config(
        validator: Validator,
        adapter: Arc<dyn BackendAdapter>,
        config: &AeroDataConfig,
    ) -> Self {
        Self {
            compiler: config.compiler.clone(),
            retry: config.execution.retry.clone(),
            strict: config.execution.strict_results,
            ..Self::new(validator, adapter)
        }
    }

    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn backend(&self) -> Backend {
        self.adapter.backend()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.mapper.validator().registry()
    }

    pub fn validator(&self) -> &Validator {
        self.mapper.validator()
    }

    /// Compiler for this context's backend.
    pub fn compiler(&self) -> Box<dyn QueryCompiler> {
        compiler_for(self.backend(), &self.compiler)
    }

    /// Execute with retry; no compilation or mapping.
    pub async fn run(&self, query: &CompiledQuery) -> QueryResult<Vec<RawRecord>> {
        if query.backend != self.backend() {
            return Err(CompileError::BackendMismatch {
                compiler: query.backend,
                adapter: self.backend(),
            }
            .into());
        }
        let adapter = &self.adapter;
        let rows = retry_with_backoff(|| adapter.execute(query), &self.retry).await?;
        debug!(
            backend = %query.backend,
            entity = %query.entity,
            rows = rows.len(),
            "Query executed"
        );
        Ok(rows)
    }

    /// Validate, compile, and execute a write.
    pub async fn apply(&self, mutation: Mutation) -> QueryResult<()> {
        let compiled = self
            .compiler()
            .compile_mutation(self.validator(), &Arc::new(mutation))?;
        self.run(&compiled).await?;
        Ok(())
    }

    fn map(&self, rows: &[RawRecord], query: &CompiledQuery) -> QueryResult<Vec<Entity>> {
        let options = MapOptions {
            fields: query.fields.clone(),
            strict: self.strict,
        };
        Ok(self
            .mapper
            .map_with(rows, &query.entity, query.backend, &options)?)
    }
}

impl QueryBuilder {
    /// Canonicalize and compile for the context's backend.
    pub fn compile(&self, ctx: &ExecutionContext, kind: QueryKind) -> QueryResult<CompiledQuery> {
        if !Arc::ptr_eq(self.registry(), ctx.registry()) {
            return Err(CompileError::RegistryMismatch {
                query: self.registry().version(),
                context: ctx.registry().version(),
            }
            .into());
        }
        let ast = Arc::new(self.ast().canonical());
        Ok(ctx.compiler().compile(self.registry(), &ast, kind)?)
    }

    /// Every matching root entity, ordered and paged as requested.
    pub async fn execute(&self, ctx: &ExecutionContext) -> QueryResult<Vec<Entity>> {
        let compiled = self.compile(ctx, QueryKind::Select)?;
        let rows = ctx.run(&compiled).await?;
        ctx.map(&rows, &compiled)
    }

    pub async fn first(&self, ctx: &ExecutionContext) -> QueryResult<Option<Entity>> {
        Ok(self.limit(1).execute(ctx).await?.into_iter().next())
    }

    /// Distinct matching roots; sort and page are ignored.
    pub async fn count(&self, ctx: &ExecutionContext) -> QueryResult<u64> {
        let compiled = self.compile(ctx, QueryKind::Count)?;
        let rows = ctx.run(&compiled).await?;
        rows.first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| QueryError::UnexpectedResult(format!("count query returned {:?}", rows)))
    }

    pub async fn exists(&self, ctx: &ExecutionContext) -> QueryResult<bool> {
        let registry = Arc::clone(self.registry());
        let identity = registry.require(&self.ast().root)?.identity.as_str();
        let lookup = self.project(&[identity])?.limit(1);
        let compiled = lookup.compile(ctx, QueryKind::Select)?;
        Ok(!ctx.run(&compiled).await?.is_empty())
    }
}
