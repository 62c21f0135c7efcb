// crates/switchboard-gateway/src/lib.rs
// ============================================================================
// Module: Switchboard Gateway
// Description: Gateway runtime aggregating downstream MCP servers.
// Purpose: Sessions, catalog, router, and the stdio JSON-RPC dispatcher.
// Dependencies: switchboard-core, switchboard-config, tokio, reqwest
// ============================================================================

//! ## Overview
//! The gateway presents one MCP endpoint to an upstream client over
//! line-delimited JSON-RPC 2.0 on standard I/O and multiplexes a configured
//! set of downstream MCP servers behind it. Downstream tool catalogs are
//! discovered in parallel, cached with a TTL, and exposed under per-server
//! namespaces alongside four built-in administration tools; calls are routed
//! back to their downstream by namespace and forwarded under deadlines.
//! Security posture: both the client and every downstream are untrusted;
//! envelopes are validated strictly and downstream output is size-limited.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod admin;
pub mod audit;
pub mod catalog;
pub mod dispatcher;
pub mod gateway;
pub mod outbound;
pub mod router;
pub mod session;
pub mod settings;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use admin::AdminError;
pub use admin::AdminOutcome;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RequestAuditEvent;
pub use audit::StderrAuditSink;
pub use catalog::CatalogStatus;
pub use catalog::ToolCatalog;
pub use dispatcher::Dispatcher;
pub use dispatcher::FatalError;
pub use gateway::Gateway;
pub use outbound::OutboundSender;
pub use router::RouteError;
pub use session::DownstreamSession;
pub use session::SessionError;
pub use session::SessionState;
pub use settings::GatewaySettings;
pub use transport::ForwardReply;
pub use transport::HttpEndpoint;
pub use transport::TransportError;
