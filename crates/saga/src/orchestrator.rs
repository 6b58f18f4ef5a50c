//! The orchestrator state machine.

use std::sync::Arc;
use std::time::Instant;

use common::Context;
use saga_log::{SagaLogEntry, SagaLogStore, SagaStatus};

use crate::{SagaError, Step};

/// Drives an ordered list of steps to completion, or unwinds the
/// completed prefix in reverse order when one fails.
///
/// Every transition is appended to the saga log when a store is attached;
/// a missing or failing store never affects the saga's outcome, since
/// durability is best-effort from the saga's point of view. The state
/// machine is `INIT → RUNNING → (COMPLETED | COMPENSATING → FAILED)` and
/// is observable only through the log.
pub struct Orchestrator {
    saga_id: String,
    steps: Vec<Box<dyn Step>>,
    log: Option<Arc<dyn SagaLogStore>>,
    payload: String,
}

impl Orchestrator {
    pub fn new(
        saga_id: impl Into<String>,
        steps: Vec<Box<dyn Step>>,
        log: Option<Arc<dyn SagaLogStore>>,
    ) -> Self {
        Self {
            saga_id: saga_id.into(),
            steps,
            log,
            payload: String::new(),
        }
    }

    /// Attaches the JSON input that started the saga. Written once on the
    /// STARTED row; later rows leave the payload empty.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Runs the saga.
    ///
    /// Returns the first step-execute error, the root cause. Compensation
    /// errors are never surfaced; they are logged and recorded in the saga
    /// log's error list.
    #[tracing::instrument(skip_all, fields(saga_id = %self.saga_id))]
    pub async fn start(mut self, cx: &Context) -> Result<(), SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let mut completed: Vec<Box<dyn Step>> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        let payload = std::mem::take(&mut self.payload);
        self.record(cx, SagaStatus::Started, "", &payload, &errors)
            .await;

        let steps = std::mem::take(&mut self.steps);
        for mut step in steps {
            tracing::info!(step = step.name(), "executing step");
            match step.execute(cx).await {
                Ok(()) => {
                    self.record(cx, SagaStatus::StepDone, step.name(), "", &errors)
                        .await;
                    completed.push(step);
                }
                Err(err) => {
                    tracing::error!(
                        step = step.name(),
                        error = %err,
                        "step failed, starting rollback"
                    );
                    errors.push(err.to_string());
                    let failed_step = step.name().to_string();

                    self.record(cx, SagaStatus::Compensating, &failed_step, "", &errors)
                        .await;
                    self.rollback(cx, &mut completed, &mut errors).await;
                    self.record(cx, SagaStatus::Failed, &failed_step, "", &errors)
                        .await;

                    metrics::counter!("saga_failed").increment(1);
                    metrics::histogram!("saga_duration_seconds")
                        .record(saga_start.elapsed().as_secs_f64());
                    return Err(err);
                }
            }
        }

        self.record(cx, SagaStatus::Completed, "", "", &errors).await;

        metrics::counter!("saga_completed").increment(1);
        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        tracing::info!("saga completed successfully");
        Ok(())
    }

    /// Compensates the completed steps in reverse (LIFO) order. A failing
    /// compensation is recorded and rollback moves on to the next step;
    /// it never aborts. Rollback writes no per-step rows; the COMPENSATING
    /// and FAILED rows bracket the whole phase.
    async fn rollback(
        &self,
        cx: &Context,
        completed: &mut Vec<Box<dyn Step>>,
        errors: &mut Vec<String>,
    ) {
        while let Some(mut step) = completed.pop() {
            tracing::info!(step = step.name(), "compensating step");
            if let Err(err) = step.compensate(cx).await {
                tracing::error!(step = step.name(), error = %err, "compensation failed");
                errors.push(format!("compensation of {} failed: {}", step.name(), err));
            }
        }
    }

    /// Appends one transition to the saga log. Store failures are logged
    /// at warn and never abort the saga.
    async fn record(
        &self,
        cx: &Context,
        status: SagaStatus,
        current_step: &str,
        payload: &str,
        errors: &[String],
    ) {
        let Some(log) = &self.log else { return };
        let entry = SagaLogEntry::record(cx, &self.saga_id, status, current_step, payload, errors);
        if let Err(err) = log.save(&entry).await {
            tracing::warn!(status = %status, error = %err, "failed to persist saga log entry");
        }
    }
}
