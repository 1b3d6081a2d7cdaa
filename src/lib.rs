//! localcowork-mcp: tool-server workers for the LocalCowork desktop agent
//!
//! A worker is a child process the host spawns and talks to over stdin/stdout
//! using newline-delimited JSON-RPC 2.0. Each worker advertises a fixed set of
//! tools and runs them on request, one at a time.
//!
//! # Architecture
//!
//! - **Protocol engine** ([`mcp`]): codec, tool registry, dispatcher and the
//!   read/dispatch/write loop shared by every worker
//! - **Tool sets** ([`tools`]): the `document` and `security` workers
//! - **Sandbox** ([`sandbox`]): the directories tools may touch, injected
//!   into each tool at startup
//!
//! The host decides which tools to call and asks the user before calling any
//! tool whose contract says it needs confirmation.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`mcp`]: Worker protocol implementation
//! - [`sandbox`]: Path containment checks
//! - [`tools`]: Worker tool sets

pub mod config;
pub mod error;
pub mod mcp;
pub mod sandbox;
pub mod tools;
