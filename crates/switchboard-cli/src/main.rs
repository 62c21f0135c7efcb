// crates/switchboard-cli/src/main.rs
// ============================================================================
// Module: Switchboard CLI Entry Point
// Description: Command-line front end for the Switchboard MCP gateway.
// Purpose: Parse arguments, wire logging and audit, run the dispatcher.
// Dependencies: clap, switchboard-gateway, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The binary speaks MCP on standard I/O, so standard output belongs to the
//! protocol: diagnostics go to stderr via `tracing`, and request audit
//! events go to stderr or an append-only file. Exit codes follow the gateway
//! contract: 0 for clean shutdown, 1 for an unusable configuration path, 2
//! for a standard I/O failure, 3 for write-queue backpressure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::ArgAction;
use clap::Parser;
use switchboard_config::ConfigError;
use switchboard_config::ConfigStore;
use switchboard_core::DEFAULT_ADMIN_PREFIX;
use switchboard_gateway::AuditSink;
use switchboard_gateway::Dispatcher;
use switchboard_gateway::FileAuditSink;
use switchboard_gateway::Gateway;
use switchboard_gateway::GatewaySettings;
use switchboard_gateway::NoopAuditSink;
use switchboard_gateway::StderrAuditSink;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Aggregating MCP gateway over standard I/O.
#[derive(Debug, Parser)]
#[command(name = "switchboard", version, about)]
struct Cli {
    /// Path of the server list document.
    #[arg(long, value_name = "PATH", default_value = "servers.json")]
    servers_file: PathBuf,
    /// Path of the launch descriptor document.
    #[arg(long, value_name = "PATH", default_value = "mcp-config.json")]
    mcp_config: PathBuf,
    /// Reserved prefix for built-in tool names.
    #[arg(long, value_name = "NAME", default_value = DEFAULT_ADMIN_PREFIX)]
    admin_prefix: String,
    /// Downstream call deadline in milliseconds.
    #[arg(long, value_name = "MS")]
    call_timeout_ms: Option<u64>,
    /// Append request audit events to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    audit_log: Option<PathBuf>,
    /// Disable request audit logging.
    #[arg(long)]
    no_audit: bool,
    /// Increase diagnostic logging on stderr (-v, -vv).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Builds gateway settings from the parsed arguments.
    fn settings(&self) -> GatewaySettings {
        let mut settings = GatewaySettings {
            admin_prefix: self.admin_prefix.clone(),
            ..GatewaySettings::default()
        };
        if let Some(timeout_ms) = self.call_timeout_ms {
            settings.call_timeout = Duration::from_millis(timeout_ms);
        }
        settings
    }

    /// Builds the audit sink from the parsed arguments.
    fn audit_sink(&self) -> Result<Arc<dyn AuditSink>, std::io::Error> {
        if self.no_audit {
            return Ok(Arc::new(NoopAuditSink));
        }
        match &self.audit_log {
            Some(path) => Ok(Arc::new(FileAuditSink::new(path)?)),
            None => Ok(Arc::new(StderrAuditSink)),
        }
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let audit = match cli.audit_sink() {
        Ok(audit) => audit,
        Err(err) => {
            error!(%err, "audit log open failed");
            return ExitCode::from(1);
        }
    };

    let store = ConfigStore::new(&cli.servers_file, &cli.mcp_config);
    // A present-but-unreadable document is an operator mistake defaults
    // would mask; a missing or unparseable one still yields a runnable
    // gateway so the admin tools can rebuild it.
    if cli.servers_file.exists()
        && let Err(err @ ConfigError::Io(_)) = store.load_server_list()
    {
        error!(%err, "server list unreadable");
        return ExitCode::from(1);
    }
    let loaded = store.load_or_default(&cli.admin_prefix);
    info!(
        servers = loaded.server_list.servers.len(),
        enabled = loaded.server_list.enabled_count(),
        tool_cap = loaded.server_list.tool_cap,
        issues = loaded.issues.len(),
        "configuration loaded"
    );

    let gateway = Gateway::new(cli.settings(), store, loaded, audit);
    spawn_signal_handler(&gateway);

    let dispatcher = Dispatcher::new(Arc::clone(&gateway));
    match dispatcher.run(tokio::io::stdin(), tokio::io::stdout()).await {
        Ok(()) => {
            info!("gateway shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "gateway terminated");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Initializes stderr diagnostics with an env-filter override.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Begins gateway shutdown on SIGINT or SIGTERM.
fn spawn_signal_handler(gateway: &Arc<Gateway>) {
    let gateway = Arc::clone(gateway);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        gateway.begin_shutdown();
    });
}

/// Resolves when the process receives a termination signal.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;
        use tokio::signal::unix::signal;
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
