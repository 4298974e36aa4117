use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use super::message::{ComputeError, ComputeJob, ComputeOutput};
use crate::{parse::TaskParser, project::ProjectResolver, storage::FileStorage};

/// Collaborators a job needs to run
pub struct ComputeContext {
  pub storage: Arc<dyn FileStorage>,
  pub parser: Arc<dyn TaskParser>,
  pub resolver: Arc<ProjectResolver>,
}

impl ComputeJob {
  /// Run the job to completion.
  ///
  /// Workers and the inline executor both call this, so the two dispatch
  /// modes produce identical results.
  pub async fn run(self, ctx: &ComputeContext) -> Result<ComputeOutput, ComputeError> {
    match self {
      ComputeJob::ParseFile { path, context } => {
        let content = ctx.storage.read(&path).await?;
        let tasks = ctx.parser.parse(&path, &content, &context);
        trace!(path = %path, tasks = tasks.len(), "Parsed file");
        Ok(ComputeOutput::Tasks(tasks))
      }
      ComputeJob::ResolveProject { path } => Ok(ComputeOutput::Project(ctx.resolver.project_data(&path).await)),
    }
  }
}

/// Dispatch strategy for compute jobs
#[async_trait]
pub trait Executor: Send + Sync {
  async fn execute(&self, job: ComputeJob) -> Result<ComputeOutput, ComputeError>;
}

/// Runs jobs on the caller's task
pub struct InlineExecutor {
  ctx: Arc<ComputeContext>,
}

impl InlineExecutor {
  pub fn new(ctx: Arc<ComputeContext>) -> Self {
    Self { ctx }
  }
}

#[async_trait]
impl Executor for InlineExecutor {
  async fn execute(&self, job: ComputeJob) -> Result<ComputeOutput, ComputeError> {
    job.run(&self.ctx).await
  }
}
