//! Model Context Protocol (MCP) server subset.
//!
//! Exposes the tutoring tools over JSON-RPC 2.0:
//!
//! - `initialize`: server identity and capabilities
//! - `tools/list`: the [`ProtocolTool`] catalog, in stable order
//! - `tools/call`: validated dispatch through [`ToolDispatcher`]
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"method":"tools/call",
//!  "params":{"name":"chat_with_student","arguments":{"student_name":"張小明","query":"我的作業?"}}}
//! ```
//!
//! Tool failures are reported inside the result (`isError: true`); only
//! envelope problems become JSON-RPC errors.

pub mod catalog;
pub mod dispatcher;
pub mod protocol;
pub mod server;
pub mod types;

pub use catalog::ProtocolTool;
pub use dispatcher::{SYSTEM_IDENTITY, ToolDispatcher};
pub use protocol::{Method, Outcome, RpcError, RpcRequest, RpcResponse, error_codes};
pub use server::McpServer;
pub use types::{CallToolParams, InitializeResult, ListToolsResult};
