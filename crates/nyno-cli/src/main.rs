//! Command-line client for the Nyno workflow server.
//!
//! Authenticates over TCP, runs a single workflow and prints its JSON
//! response. Local extension commands can be run without a server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nyno_core::{
    emit_response, format_client_error, ClientError, Credentials, Session, SessionConfig,
};
use nyno_extensions::ExtensionRegistry;
use serde_json::{json, Map, Value};
use std::process::ExitCode;

/// Command-line client for the Nyno workflow server.
#[derive(Parser, Debug)]
#[command(name = "nyno-client")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server host [default: $NYNO_HOST or 127.0.0.1]
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port [default: $NYNO_PORT or 6001]
    #[arg(long, global = true)]
    port: Option<u16>,

    /// API key sent as {"apiKey": ...} [default: $NYNO_API_KEY or changeme]
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Full credential mapping as a JSON object (overrides --api-key)
    #[arg(long, global = true)]
    credentials: Option<String>,

    /// Socket timeout in seconds [default: $NYNO_TIMEOUT or 2.0]
    #[arg(long, global = true)]
    timeout: Option<f64>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate and print the server's response
    Auth,

    /// Run a workflow and print its response
    Run {
        /// Workflow path (e.g., /sync/users)
        path: String,

        /// Extra request fields as a JSON object
        #[arg(long)]
        data: Option<String>,
    },

    /// Run a local extension command
    Ext {
        /// Extension name (e.g., hello)
        name: String,

        /// Arguments passed to the extension
        args: Vec<String>,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Ext { name, args } => run_extension(name, args, cli.pretty),
        Command::Auth => run_remote(&cli, None),
        Command::Run { path, data } => run_remote(&cli, Some((path, data.as_deref()))),
    }
}

/// Environment defaults overridden by any flags given on the command line.
fn build_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = SessionConfig::from_env().context("Invalid NYNO_* environment")?;

    if let Some(ref host) = cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ref key) = cli.api_key {
        config.credentials = Credentials::api_key(key.clone());
    }
    if let Some(ref json) = cli.credentials {
        config.credentials = Credentials::from_json(json).context("Invalid --credentials")?;
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout_secs(secs).context("Invalid --timeout")?;
    }

    Ok(config)
}

fn parse_data(data: Option<&str>) -> Result<Option<Map<String, Value>>> {
    data.map(|raw| {
        serde_json::from_str::<Map<String, Value>>(raw).context("--data must be a JSON object")
    })
    .transpose()
}

fn run_remote(cli: &Cli, workflow: Option<(&String, Option<&str>)>) -> ExitCode {
    let prepared = build_config(cli).and_then(|config| {
        let data = match workflow {
            Some((_, data)) => parse_data(data)?,
            None => None,
        };
        Ok((config, data))
    });
    let (config, data) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let mut session = Session::new(config);
    let result = session.connect().and_then(|auth| match workflow {
        Some((path, _)) => session.run_workflow(path, data.as_ref()),
        None => Ok(auth),
    });
    session.close();

    match result {
        Ok(response) => {
            println!("{}", emit_response(&response, cli.pretty));
            ExitCode::from(0)
        }
        Err(e) => {
            // Format client-side error as a stable JSON shape
            let error_json = format_client_error(&e);
            eprintln!("{}", emit_response(&error_json, cli.pretty));
            match e {
                ClientError::Authentication { .. } => ExitCode::from(1),
                _ => ExitCode::from(2),
            }
        }
    }
}

fn run_extension(name: &str, args: &[String], pretty: bool) -> ExitCode {
    let registry = ExtensionRegistry::with_builtin();
    let mut context = Map::new();

    match registry.run(name, args, &mut context) {
        Some(output) => {
            let out = json!({ "output": output, "context": context });
            println!("{}", emit_response(&out, pretty));
            ExitCode::from(0)
        }
        None => {
            eprintln!(
                "Unknown extension: {} (available: {})",
                name,
                registry.names().join(", ")
            );
            ExitCode::from(1)
        }
    }
}
