//! Superagent: email-driven plan-and-execute agent over a JSON-RPC tool gateway.

pub mod agents;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod notify;
pub mod plan;
pub mod server;
