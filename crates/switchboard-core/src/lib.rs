// crates/switchboard-core/src/lib.rs
// ============================================================================
// Module: Switchboard Core
// Description: Protocol surface shared across the Switchboard gateway.
// Purpose: Define JSON-RPC envelopes, namespaces, and tool descriptors.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Switchboard Core holds the protocol vocabulary the gateway speaks on both
//! of its boundaries: JSON-RPC 2.0 envelopes and error codes, the
//! deterministic namespace derivation applied to downstream server names, and
//! the descriptors for built-in and aggregated tools. The crate performs no
//! I/O; everything here is a value type or a pure function.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod namespace;
pub mod rpc;
pub mod tooling;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use namespace::derive_namespace;
pub use namespace::namespaced_tool_name;
pub use namespace::resolve_namespace_prefix;
pub use rpc::DownstreamMessage;
pub use rpc::Notification;
pub use rpc::Request;
pub use rpc::RequestEnvelope;
pub use rpc::Response;
pub use rpc::RpcError;
pub use tooling::AdminTool;
pub use tooling::DEFAULT_ADMIN_PREFIX;
pub use tooling::ToolDescriptor;
pub use tooling::admin_tool_definitions;
