use treadle::{StateStore, WorkItem, Workflow};

use crate::{CatalogJob, IngestStage};

/// Build the ingest workflow around a configured stage.
///
/// # Errors
/// Returns an error if the stage's configuration is invalid or the workflow
/// cannot be built.
pub fn build_pipeline(stage: IngestStage) -> treadle::Result<Workflow> {
    stage.config().validate().map_err(|e| {
        treadle::TreadleError::InvalidWorkflow(format!("Failed to create ingest stage: {e}"))
    })?;

    Workflow::builder().stage("ingest", stage).build()
}

/// Run `job` through `workflow` from the first stage.
///
/// Stage states left by an earlier run of the same job are cleared first;
/// otherwise treadle would consider a finished job done and skip it. Resume
/// state lives in the dataset store, not here.
///
/// # Errors
/// Returns an error if the state store cannot be updated or a stage fails.
pub async fn run_job<S: StateStore>(
    workflow: &Workflow,
    job: &CatalogJob,
    store: &mut S,
) -> treadle::Result<()> {
    store.delete_work_item(job.id()).await?;
    log::debug!("Running {} as {}", job, job.id());
    workflow.advance(job, store).await
}
