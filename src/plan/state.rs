//! Step lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a single plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Not started yet.
    Pending,
    /// Sub-agent or tool call in flight.
    Running,
    Succeeded,
    Failed,
}

impl StepState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: StepState) -> bool {
        use StepState::*;

        matches!(
            (self, target),
            (Pending, Running) | (Pending, Failed) | (Running, Succeeded) | (Running, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTransition {
    pub from: StepState,
    pub to: StepState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Lifecycle of one step execution. Lives only for the duration of the step.
#[derive(Debug, Clone)]
pub struct StepLifecycle {
    pub execution_order: i64,
    pub state: StepState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub transitions: Vec<StepTransition>,
}

impl StepLifecycle {
    pub fn new(execution_order: i64) -> Self {
        Self {
            execution_order,
            state: StepState::Pending,
            started_at: None,
            finished_at: None,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state.
    pub fn transition_to(
        &mut self,
        new_state: StepState,
        reason: Option<String>,
    ) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition step {} from {} to {}",
                self.execution_order, self.state, new_state
            ));
        }

        tracing::debug!(
            step = self.execution_order,
            from = %self.state,
            to = %new_state,
            "Step state transition"
        );

        self.transitions.push(StepTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        });
        self.state = new_state;

        match new_state {
            StepState::Running => self.started_at = Some(Utc::now()),
            StepState::Succeeded | StepState::Failed => self.finished_at = Some(Utc::now()),
            StepState::Pending => {}
        }

        Ok(())
    }

    pub fn start(&mut self) -> Result<(), String> {
        self.transition_to(StepState::Running, None)
    }

    pub fn succeed(&mut self) -> Result<(), String> {
        self.transition_to(StepState::Succeeded, None)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), String> {
        self.transition_to(StepState::Failed, Some(reason.into()))
    }

    /// Wall-clock time spent running, once finished.
    pub fn elapsed_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.signed_duration_since(start).num_milliseconds()),
            _ => None,
        }
    }
}
