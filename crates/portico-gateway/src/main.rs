//! Portico gateway binary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use portico_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
use portico_gateway::GatewayServer;
use portico_telemetry::init_telemetry;
use tracing::{error, info};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = Some(
                        args.next()
                            .map(PathBuf::from)
                            .ok_or_else(|| "--config requires a path".to_string())?,
                    );
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("portico-gateway {}", portico_gateway::VERSION);
                    std::process::exit(0);
                }
                other => return Err(format!("unknown argument: {other}")),
            }
        }

        Ok(Self { config })
    }
}

fn print_help() {
    println!(
        r"Portico - edge gateway with a phased filter pipeline

USAGE:
    portico-gateway [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    PORTICO__SERVER__HTTP_ADDR             Listen address (default: 0.0.0.0:8080)
    PORTICO__SERVER__REQUEST_TIMEOUT_MS    Upstream timeout (default: 30000)
    PORTICO__TELEMETRY__LOGGING__LEVEL     Log filter directives (default: info)
    PORTICO__TELEMETRY__LOGGING__FORMAT    json or pretty (default: json)
    PORTICO__FILTERS__DISABLED             Comma-separated built-in filters to skip
    PORTICO__ROUTES__<NAME>__URL           Override a configured route's upstream

A .env file in the working directory is loaded if present.
"
    );
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut loader = ConfigLoader::new().with_dotenv();
    if let Some(path) = &args.config {
        loader = loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
    }
    let config = loader
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()
        .context("invalid configuration")?;

    init_telemetry(&config.telemetry.to_telemetry_config())
        .context("initializing telemetry")?;

    info!(
        version = portico_gateway::VERSION,
        config = ?args.config,
        addr = %config.server.http_addr,
        "Starting Portico gateway"
    );

    GatewayServer::from_config(config)?.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("Use --help for usage information");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized yet
            error!(error = %format!("{e:#}"), "Gateway failed");
            eprintln!("portico-gateway: {e:#}");
            ExitCode::FAILURE
        }
    }
}
