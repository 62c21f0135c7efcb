// crates/switchboard-gateway/src/router.rs
// ============================================================================
// Module: Tool Call Router
// Description: Resolution of namespaced tool names to their handlers.
// Purpose: Dispatch built-ins and forward downstream calls under deadlines.
// Dependencies: serde, serde_json, switchboard-core
// ============================================================================

//! ## Overview
//! A `tools/call` resolves in two steps: built-in names under the reserved
//! prefix dispatch to the admin tools; everything else resolves by the
//! longest enabled-namespace prefix with an exact underscore boundary and is
//! forwarded to that downstream with its original tool name. Downstream
//! replies are relayed verbatim, `result` or `error` alike.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;
use switchboard_core::AdminTool;
use switchboard_core::Response;
use switchboard_core::resolve_namespace_prefix;
use switchboard_core::rpc;
use thiserror::Error;

use crate::admin::AdminError;
use crate::gateway::Gateway;
use crate::session::SessionError;
use crate::transport::ForwardReply;

// ============================================================================
// SECTION: Types
// ============================================================================

/// `tools/call` parameters from the client.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Namespaced tool name.
    name: String,
    /// Parameters passed through to the resolved tool.
    #[serde(default)]
    parameters: Value,
}

/// Routing failures for non-built-in tool calls.
#[derive(Debug, Error)]
pub enum RouteError {
    /// No enabled namespace matches the tool name.
    #[error("method not found")]
    UnknownTool,
    /// The resolved session failed the forward.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Routed outcome of one `tools/call`: the response plus an optional
/// `update/tools` message to emit after it, and the tool name for auditing.
#[derive(Debug)]
pub struct RoutedCall {
    /// Response to emit for the client request.
    pub response: Response,
    /// Notification message emitted after the response.
    pub notify: Option<String>,
    /// Tool name extracted from the call, when parseable.
    pub tool: Option<String>,
}

// ============================================================================
// SECTION: Routing
// ============================================================================

impl Gateway {
    /// Handles one `tools/call` request end to end.
    pub async fn handle_tools_call(&self, id: Value, params: Value) -> RoutedCall {
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(err) => {
                return RoutedCall {
                    response: Response::error(
                        id,
                        rpc::INVALID_PARAMS,
                        format!("invalid tool call params: {err}"),
                    ),
                    notify: None,
                    tool: None,
                };
            }
        };
        let tool = Some(call.name.clone());

        if let Some(admin) = AdminTool::parse_namespaced(&self.settings().admin_prefix, &call.name) {
            let (response, notify) = match self.handle_admin_tool(admin, call.parameters).await {
                Ok(outcome) => (Response::success(id, outcome.payload), outcome.notify),
                Err(AdminError::InvalidParams(message)) => {
                    (Response::error(id, rpc::INVALID_PARAMS, message), None)
                }
                Err(AdminError::Internal(message)) => {
                    (Response::error(id, rpc::INTERNAL_ERROR, message), None)
                }
            };
            return RoutedCall {
                response,
                notify,
                tool,
            };
        }

        let response = match self.forward_tool_call(&call.name, call.parameters).await {
            Ok(reply) => match reply.error {
                Some(error) => Response::relay_error(id, error),
                None => Response::success(id, reply.result.unwrap_or(Value::Null)),
            },
            Err(RouteError::UnknownTool) => {
                Response::error(id, rpc::METHOD_NOT_FOUND, "method not found")
            }
            Err(RouteError::Session(err)) => {
                Response::error(id, rpc::INTERNAL_ERROR, err.to_string())
            }
        };
        RoutedCall {
            response,
            notify: None,
            tool,
        }
    }

    /// Resolves a namespaced tool name and forwards the call.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownTool`] when no enabled namespace matches,
    /// or [`RouteError::Session`] when the downstream cannot serve the call.
    pub(crate) async fn forward_tool_call(
        &self,
        namespaced: &str,
        parameters: Value,
    ) -> Result<ForwardReply, RouteError> {
        let target = {
            let candidates: Vec<(String, String)> = self
                .enabled_records()
                .into_iter()
                .map(|record| (record.namespace(), record.name))
                .collect();
            resolve_namespace_prefix(
                namespaced,
                candidates.iter().map(|(namespace, _)| namespace.as_str()),
            )
            .and_then(|(namespace, original)| {
                // First record wins a namespace collision; later ones are
                // flagged unreachable at config load.
                candidates
                    .iter()
                    .find(|(candidate, _)| candidate == namespace)
                    .map(|(_, server)| (server.clone(), original.to_string()))
            })
        };
        let Some((server_name, original)) = target else {
            return Err(RouteError::UnknownTool);
        };

        let deadline = self.settings().call_timeout;
        let session = self.session_for_name(&server_name)?;
        session.ensure_ready(deadline).await?;
        let params = serde_json::json!({
            "name": original,
            "parameters": parameters,
        });
        Ok(session.forward("tools/call", Some(params), deadline).await?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
