//! MCP (Model Context Protocol) Server Implementation
//!
//! A stdio JSON-RPC 2.0 server exposing corpus retrieval as a tool.


pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{ConnectionState, McpServer, MessageHandler, ToolHandler};
pub use tools::SearchHandler;
