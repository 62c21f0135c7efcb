// crates/switchboard-gateway/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared gateway harness and fake downstreams for scenarios.
// Purpose: Drive a running dispatcher exactly as an MCP client would.
// Dependencies: switchboard-gateway, tiny_http, tempfile, tokio
// ============================================================================

//! ## Overview
//! The harness boots a full gateway (config documents on disk, dispatcher on
//! in-memory duplex pipes) and exposes a client-side API: send a request,
//! await the response with the matching id, and collect the notifications
//! that interleave. Fake downstreams come in two flavors: a `tiny_http`
//! JSON-RPC server on a loopback port, and `sh` line-responders for the
//! child-process transport.

#![allow(
    dead_code,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Shared test helpers may be unused and assert freely."
)]

use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;
use switchboard_config::ConfigStore;
use switchboard_gateway::Dispatcher;
use switchboard_gateway::FatalError;
use switchboard_gateway::Gateway;
use switchboard_gateway::GatewaySettings;
use switchboard_gateway::NoopAuditSink;
use tempfile::TempDir;
use tiny_http::Response;
use tiny_http::Server;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

/// How long the harness waits for any single expected line.
pub const READ_DEADLINE: Duration = Duration::from_secs(10);

/// Settings with compressed timeouts for downstream failure paths.
#[must_use]
pub fn fast_settings() -> GatewaySettings {
    GatewaySettings {
        call_timeout: Duration::from_millis(400),
        init_timeout: Duration::from_secs(2),
        shutdown_grace: Duration::from_millis(200),
        ..GatewaySettings::default()
    }
}

// ============================================================================
// SECTION: Gateway Harness
// ============================================================================

/// A running gateway plus the client side of its standard I/O.
pub struct Harness {
    /// Keeps the temp config directory alive.
    _dir: TempDir,
    /// Writes request lines into the dispatcher's reader.
    input: DuplexStream,
    /// Reads emitted lines from the dispatcher's writer.
    output: tokio::io::Lines<BufReader<DuplexStream>>,
    /// Running dispatcher loop.
    run: JoinHandle<Result<(), FatalError>>,
    /// Notifications collected while waiting for responses.
    pub notifications: Vec<Value>,
    /// Responses that arrived out of order, keyed by their raw value.
    parked_responses: Vec<Value>,
}

impl Harness {
    /// Boots a gateway over the given configuration documents.
    #[must_use]
    pub fn start(server_list: &Value, launch: &Value, settings: GatewaySettings) -> Self {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("servers.json"), server_list.to_string())
            .expect("write servers.json");
        fs::write(dir.path().join("mcp-config.json"), launch.to_string())
            .expect("write mcp-config.json");
        let store =
            ConfigStore::new(dir.path().join("servers.json"), dir.path().join("mcp-config.json"));
        let loaded = store.load_or_default(&settings.admin_prefix);
        let gateway = Gateway::new(settings, store, loaded, Arc::new(NoopAuditSink));
        let (input, gateway_reader) = tokio::io::duplex(64 * 1024);
        let (gateway_writer, output) = tokio::io::duplex(64 * 1024);
        let run = tokio::spawn(async move {
            Dispatcher::new(gateway).run(gateway_reader, gateway_writer).await
        });
        Self {
            _dir: dir,
            input,
            output: BufReader::new(output).lines(),
            run,
            notifications: Vec::new(),
            parked_responses: Vec::new(),
        }
    }

    /// Sends one request and awaits the response with the same id.
    pub async fn request(&mut self, id: u64, method: &str, params: Option<Value>) -> Value {
        let mut envelope = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if let Some(params) = params {
            envelope["params"] = params;
        }
        let line = envelope.to_string();
        self.input.write_all(line.as_bytes()).await.expect("write request");
        self.input.write_all(b"\n").await.expect("write newline");
        self.response_for(id).await
    }

    /// Sends a `tools/call` for the given namespaced tool name.
    pub async fn call_tool(&mut self, id: u64, name: &str, parameters: Value) -> Value {
        self.request(id, "tools/call", Some(json!({"name": name, "parameters": parameters}))).await
    }

    /// Reads lines until the response with the given id arrives.
    async fn response_for(&mut self, id: u64) -> Value {
        if let Some(position) =
            self.parked_responses.iter().position(|response| response["id"] == json!(id))
        {
            return self.parked_responses.remove(position);
        }
        loop {
            let value = self.next_line().await;
            if value.get("id").is_none() {
                self.notifications.push(value);
                continue;
            }
            if value["id"] == json!(id) {
                return value;
            }
            self.parked_responses.push(value);
        }
    }

    /// Awaits the next `update/tools` notification, collected or fresh.
    pub async fn wait_update_tools(&mut self) -> Value {
        if let Some(position) = self
            .notifications
            .iter()
            .position(|notification| notification["method"] == json!("update/tools"))
        {
            return self.notifications.remove(position);
        }
        loop {
            let value = self.next_line().await;
            if value.get("id").is_some() {
                self.parked_responses.push(value);
                continue;
            }
            if value["method"] == json!("update/tools") {
                return value;
            }
            self.notifications.push(value);
        }
    }

    /// Returns how many collected notifications use `update/tools`.
    #[must_use]
    pub fn collected_update_tools(&self) -> usize {
        self.notifications
            .iter()
            .filter(|notification| notification["method"] == json!("update/tools"))
            .count()
    }

    /// Reads one emitted line under the harness deadline.
    async fn next_line(&mut self) -> Value {
        let line = tokio::time::timeout(READ_DEADLINE, self.output.next_line())
            .await
            .expect("line before deadline")
            .expect("readable output")
            .expect("line before eof");
        serde_json::from_str(&line).expect("valid json line")
    }

    /// Closes the client input and awaits the dispatcher outcome.
    pub async fn finish(self) -> Result<(), FatalError> {
        drop(self.input);
        tokio::time::timeout(READ_DEADLINE, self.run)
            .await
            .expect("dispatcher exits")
            .expect("dispatcher task")
    }
}

// ============================================================================
// SECTION: Fake HTTP Downstream
// ============================================================================

/// Handle onto a fake HTTP MCP downstream.
pub struct FakeHttpMcp {
    /// Base URL for the server record.
    pub url: String,
    /// `tools/call` params observed by the downstream, in order.
    pub observed: Arc<Mutex<Vec<Value>>>,
    /// Tools returned by `tools/list`; swap to change behaviour.
    pub tools: Arc<Mutex<Value>>,
}

/// Spawns a fake MCP server answering JSON-RPC over `POST /mcp`.
#[must_use]
pub fn spawn_http_mcp(initial_tools: Value) -> FakeHttpMcp {
    let server = Server::http("127.0.0.1:0").expect("bind fake server");
    let addr = server.server_addr().to_ip().expect("server addr");
    let url = format!("http://{addr}/");
    let observed = Arc::new(Mutex::new(Vec::new()));
    let tools = Arc::new(Mutex::new(initial_tools));
    let observed_in_thread = Arc::clone(&observed);
    let tools_in_thread = Arc::clone(&tools);

    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            assert_eq!(request.url(), "/mcp", "gateway must post to the /mcp endpoint");
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let result = match parsed["method"].as_str().unwrap_or_default() {
                "initialize" => json!({"capabilities": {}}),
                "tools/list" => {
                    let tools = tools_in_thread.lock().expect("tools lock").clone();
                    json!({"tools": tools})
                }
                "tools/call" => {
                    let params = parsed["params"].clone();
                    observed_in_thread.lock().expect("observed lock").push(params.clone());
                    json!({"echo": params})
                }
                _ => json!({}),
            };
            let reply = json!({
                "jsonrpc": "2.0",
                "id": parsed["id"].clone(),
                "result": result,
            });
            let _ = request.respond(Response::from_string(reply.to_string()));
        }
    });

    FakeHttpMcp {
        url,
        observed,
        tools,
    }
}

// ============================================================================
// SECTION: Fake Stdio Downstreams
// ============================================================================

/// Script replying to `initialize` (local id 1) and nothing else.
pub const SH_INITIALIZE_ONLY: &str = r#"read line; printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'; while read line; do :; done"#;

/// Script replying to the gateway's deterministic startup sequence:
/// `initialize` (1), discovery `tools/list` (2), then echoing calls by count.
pub const SH_ECHO_SERVER: &str = r#"n=0; while read line; do n=$((n+1)); case $n in 1) printf '{"jsonrpc":"2.0","id":1,"result":{}}\n';; 2) printf '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"","parameters":{}}]}}\n';; *) printf '{"jsonrpc":"2.0","id":%d,"result":{"ok":true}}\n' "$n";; esac; done"#;

/// Script replying to `initialize`, then pushing a spontaneous notification.
pub const SH_NOTIFIER: &str = r#"read line; printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'; printf '{"jsonrpc":"2.0","method":"update/tools","params":{"message":"hi from downstream"}}\n'; while read line; do :; done"#;

/// Builds a launch document spawning `sh -c <script>` for one server name.
#[must_use]
pub fn sh_launch(name: &str, script: &str) -> Value {
    json!({
        "mcpServers": {
            name: {
                "command": "/bin/sh",
                "args": ["-c", script],
            },
        },
    })
}
