//! Plan runner: executes every step in list order and summarizes the run.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::StepError;
use crate::plan::executor::StepExecutor;
use crate::plan::types::{EmailPayload, ExecutionPlan, RunSummary, StepExecutionResult};

/// Reason recorded on steps skipped after the run deadline passed.
pub const DEADLINE_SKIP_REASON: &str = "not executed: run deadline exceeded";

pub struct PlanRunner {
    executor: StepExecutor,
    deadline: Option<Duration>,
}

impl PlanRunner {
    pub fn new(executor: StepExecutor) -> Self {
        Self {
            executor,
            deadline: None,
        }
    }

    /// Bound the whole run. The in-flight step is failed when it expires.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Run all steps sequentially. A failed step never stops the run.
    pub async fn run(&self, plan: &ExecutionPlan, email: &EmailPayload) -> RunSummary {
        let deadline = self.deadline.map(|after| Instant::now() + after);
        self.run_until(plan, email, deadline).await
    }

    /// Like [`run`](Self::run), against a deadline fixed by the caller.
    pub async fn run_until(
        &self,
        plan: &ExecutionPlan,
        email: &EmailPayload,
        deadline: Option<Instant>,
    ) -> RunSummary {
        let after = self.deadline.unwrap_or_default();
        let mut results: Vec<StepExecutionResult> = Vec::with_capacity(plan.steps.len());

        tracing::info!(
            goal = %plan.goal,
            steps = plan.steps.len(),
            "Starting plan run"
        );

        for step in &plan.steps {
            let result = match deadline {
                Some(at) if Instant::now() >= at => {
                    StepExecutionResult::failure(step, DEADLINE_SKIP_REASON)
                }
                Some(at) => {
                    match tokio::time::timeout_at(at, self.executor.execute(step, &results, email))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            let error = StepError::Timeout {
                                phase: format!("step {}", step.execution_order),
                                after,
                            };
                            tracing::error!(
                                step = step.execution_order,
                                error = %error,
                                "Run deadline exceeded"
                            );
                            StepExecutionResult::failure(step, error.to_string())
                        }
                    }
                }
                None => self.executor.execute(step, &results, email).await,
            };
            results.push(result);
        }

        let summary = RunSummary::new(plan, results);
        tracing::info!(
            total = summary.total_steps,
            succeeded = summary.successful_steps,
            failed = summary.failed_steps,
            "Plan run completed"
        );
        summary
    }
}
