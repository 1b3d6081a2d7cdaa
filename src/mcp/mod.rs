//! The worker protocol engine.
//!
//! Every worker process speaks newline-delimited JSON-RPC 2.0 over stdio and
//! shares this engine; only the set of registered tools differs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Worker                            │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌──────────────┐     │
//! │   │  Transport  │───▶│ Dispatcher  │───▶│   Registry   │     │
//! │   │   (stdio)   │    │  (methods)  │    │   (tools)    │     │
//! │   └─────────────┘    └─────────────┘    └──────────────┘     │
//! │          │                  │                   │            │
//! │          ▼                  ▼                   ▼            │
//! │   ┌──────────────────────────────────────────────────┐       │
//! │   │            JSON-RPC codec (protocol)             │       │
//! │   └──────────────────────────────────────────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests are processed strictly one at a time.

pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use dispatcher::{Dispatcher, ServerInfo};
pub use protocol::{decode, ErrorCode, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use registry::{Tool, ToolContract, ToolRegistry};
pub use server::McpServer;
pub use transport::{StdioTransport, Transport};
