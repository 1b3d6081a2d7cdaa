//! localcowork-mcp: JSON-RPC tool-server worker for the LocalCowork agent
//!
//! The host spawns one process per tool set and talks to it over stdin/stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use localcowork_mcp::config;
use localcowork_mcp::mcp::{Dispatcher, McpServer, ServerInfo, StdioTransport};
use localcowork_mcp::sandbox::Sandbox;
use localcowork_mcp::tools::{self, Worker};

/// JSON-RPC tool-server worker for the LocalCowork desktop agent.
///
/// Reads one request per line on stdin and writes one response per line on
/// stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "localcowork-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tool set to serve
    #[arg(value_enum, value_name = "SERVER")]
    server: Worker,

    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. Stdout carries protocol frames only.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %args.server,
        "Starting localcowork-mcp worker"
    );

    let sandbox = match &cfg.allowed_paths {
        Some(paths) => Sandbox::new(paths),
        None => Sandbox::from_env(),
    };
    info!(allowed_paths = ?sandbox.roots(), "Sandbox configured");

    let registry = match tools::build_registry(args.server, &sandbox) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Failed to build tool registry");
            return ExitCode::FAILURE;
        }
    };
    info!(tools = registry.len(), "Tools registered");

    let dispatcher = Dispatcher::new(ServerInfo::new(args.server.name()), registry)
        .with_tool_timeout(cfg.tool_timeout());
    let mut server = McpServer::new(dispatcher, StdioTransport::stdio());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!("Worker ready, waiting for requests...");

    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!(handled = server.handled(), "Worker shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Worker error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn parses_server_and_flags() {
        let args = Args::try_parse_from(["localcowork-mcp", "security", "-vv"]).unwrap();
        assert_eq!(args.server, Worker::Security);
        assert_eq!(args.verbose, 2);
        assert!(args.config.is_none());

        assert!(Args::try_parse_from(["localcowork-mcp", "calendar"]).is_err());
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(1, false, "error"), Level::INFO);
        assert_eq!(get_log_level(3, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(0, false, "bogus"), Level::WARN);
    }
}
