use std::sync::Arc;

use super::command::{CommandArgs, JobRequest};
use super::executor::{Executor, ProcessExecutor};
use super::registry::{
    DEFAULT_OUTPUT_CAPACITY, MAX_OUTPUT_CAPACITY, OutputChunk, OutputRegistry, output_queue,
};
use super::store::JobTypeStore;
use crate::config::ServiceConfig;
use crate::errors::{FanoutError, Result};
use crate::token::Token;

/// Submits patch runs and serves their output.
pub struct FanoutService {
    store: JobTypeStore,
    executor: Arc<dyn Executor>,
    registry: Arc<OutputRegistry>,
    output_capacity: usize,
    new_token: fn() -> Result<Token>,
}

impl FanoutService {
    pub fn new(store: JobTypeStore, executor: Arc<dyn Executor>) -> Self {
        Self {
            store,
            executor,
            registry: Arc::new(OutputRegistry::new()),
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            new_token: Token::generate,
        }
    }

    /// Service running the configured tool against the configured patches.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            JobTypeStore::new(&config.patches_dir),
            Arc::new(ProcessExecutor::new(&config.tool)),
        )
        .with_output_capacity(config.output_capacity)
    }

    /// Share an existing registry, e.g. between services with different tools.
    pub fn with_registry(mut self, registry: Arc<OutputRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity.clamp(1, MAX_OUTPUT_CAPACITY);
        self
    }

    #[cfg(test)]
    fn with_token_source(mut self, new_token: fn() -> Result<Token>) -> Self {
        self.new_token = new_token;
        self
    }

    pub fn registry(&self) -> &Arc<OutputRegistry> {
        &self.registry
    }

    /// Names of the job types that can be submitted.
    pub async fn job_types(&self) -> Result<Vec<String>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list()).await?
    }

    /// Start a patch run and return the token for its output.
    ///
    /// Does not wait for the run to finish. Everything up to and including
    /// spawning the tool is checked here; later failures only show up in the
    /// output stream.
    pub async fn run(&self, request: JobRequest) -> Result<Token> {
        let store = self.store.clone();
        let job_type = request.job_type.clone();
        let (config, job_file) = tokio::task::spawn_blocking(move || -> Result<_> {
            if !store.list()?.contains(&job_type) {
                return Err(FanoutError::InvalidJobType { name: job_type });
            }
            let config = store.load(&job_type)?;
            Ok((config, store.job_file(&job_type)))
        })
        .await??;
        let args = CommandArgs::build(&request, &config, &job_file);

        let token = (self.new_token)()?;
        let (writer, queue) = output_queue(self.output_capacity);
        if !self.registry.register(token.clone(), queue) {
            return Err(FanoutError::RandomSource(
                "generated token collides with a live job".to_string(),
            ));
        }

        if let Err(e) = self.executor.launch(args, writer).await {
            self.registry.remove(&token);
            tracing::error!(patch = %request.job_type, error = %e, "failed to launch patch run");
            return Err(e);
        }

        tracing::info!(
            patch = %request.job_type,
            org = %request.organization,
            dry_run = request.dry_run,
            "patch run started"
        );
        Ok(token)
    }

    /// Output produced since the last poll. See [`OutputRegistry::drain`].
    pub fn output(&self, token: &Token) -> Result<OutputChunk> {
        self.registry.drain(token)
    }
}
