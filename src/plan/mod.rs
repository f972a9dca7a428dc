//! Planning data model and execution.

pub mod executor;
pub mod runner;
pub mod sanitize;
pub mod schema;
pub mod state;
pub mod types;

pub use executor::StepExecutor;
pub use runner::PlanRunner;
pub use sanitize::{parse_agent_json, sanitize};
pub use schema::{
    validate_communication_response, validate_email_payload, validate_execution_plan,
    validate_request_builder_response,
};
pub use state::{StepLifecycle, StepState};
pub use types::*;
