//! Tutor agent service
//!
//! A school tutoring assistant: a model-backed conversational agent with
//! per-student memory, a set of school-data functions the model can call,
//! and a JSON-RPC tool server (MCP) fronting the agent.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP routes for chat, homework analysis, and the protocol endpoint
//! - **Agent**: per-student conversations running a bounded tool-invocation loop
//! - **School data**: students, courses, enrollments, homework behind a store trait
//! - **Protocol**: JSON-RPC 2.0 `initialize`, `tools/list`, `tools/call`
//!
//! # Modules
//!
//! - [`agent`]: conversation orchestrator
//! - [`api`]: HTTP handlers
//! - [`llm`]: model driver trait, drivers, and the tool loop
//! - [`mcp`]: JSON-RPC envelope and protocol tool server
//! - [`school`]: school data model, store, and model-facing functions
//! - [`session`]: per-student conversation state
//! - [`tools`]: typed tool catalogs and argument validation

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod school;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod tools;

use std::sync::Arc;

use crate::agent::ConversationOrchestrator;
use crate::config::AppConfig;
use crate::mcp::McpServer;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Conversation orchestrator (owns the session store and toolbox).
    pub agent: Arc<ConversationOrchestrator>,
    /// JSON-RPC tool server.
    pub mcp: Arc<McpServer>,
    pub config: Arc<AppConfig>,
}
