//! Imposter CLI
//!
//! Usage:
//!   imposter start --config-file rules.yaml [OPTIONS]
//!   imposter validate --config-file rules.yaml [--json]
//!   imposter version

use anyhow::Context;
use clap::{Parser, Subcommand};
use imposter_http::server::DEFAULT_PORT;
use imposter_http::{validate, Config, ImposterServer, RecordKey, ServerOptions};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "imposter")]
#[command(author, version, about = "Rule-driven HTTP mock server")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info", env = "IMPOSTER_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start serving the configured rules
    Start(StartArgs),
    /// Check a configuration file without serving it
    Validate {
        /// Configuration file, or "stdin"
        #[arg(long, default_value = "stdin")]
        config_file: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the version
    Version,
}

#[derive(clap::Args, Debug)]
struct StartArgs {
    /// The listening TCP port
    #[arg(long, default_value_t = DEFAULT_PORT, env = "IMPOSTER_PORT")]
    port: u16,

    /// The configuration file (JSON or YAML)
    #[arg(long, env = "IMPOSTER_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// X.509 certificate (PEM) to serve HTTPS
    #[arg(long, env = "IMPOSTER_TLS_CERT_FILE")]
    tls_cert_file: Option<PathBuf>,

    /// Private key (PEM) matching the certificate
    #[arg(long, env = "IMPOSTER_TLS_KEY_FILE")]
    tls_key_file: Option<PathBuf>,

    /// Seconds to wait for open connections on shutdown
    #[arg(long, default_value_t = 15)]
    graceful_timeout: u64,

    /// Record PUT bodies keyed by URI parts, e.g. "host|path|query"
    #[arg(long)]
    record: Option<RecordKey>,

    /// Add permissive CORS headers to every response
    #[arg(long)]
    cors: bool,

    /// Seconds before a `link` request is abandoned
    #[arg(long, default_value_t = 30)]
    link_timeout: u64,

    /// Largest file, in bytes, the `file` built-in will read
    #[arg(long, default_value_t = imposter_expr::DEFAULT_MAX_FILE_SIZE)]
    max_file_size: u64,

    /// Longest string the `rnd_string` built-in will generate
    #[arg(long, default_value_t = imposter_expr::DEFAULT_MAX_STRING_LENGTH)]
    max_string_length: usize,
}

impl StartArgs {
    fn options(&self) -> ServerOptions {
        ServerOptions {
            port: self.port,
            tls_cert_file: self.tls_cert_file.clone(),
            tls_key_file: self.tls_key_file.clone(),
            graceful_timeout: Duration::from_secs(self.graceful_timeout),
            record: self.record,
            cors: self.cors,
            link_timeout: Duration::from_secs(self.link_timeout),
            max_file_size: self.max_file_size,
            max_string_length: self.max_string_length,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command {
        Commands::Start(args) => start(args).await,
        Commands::Validate { config_file, json } => {
            let config = load_config(&config_file).context("could not load configuration")?;
            let report = validate(&config);
            if report.is_ok() {
                return Ok(());
            }
            if json {
                println!("{}", report.render_json()?);
            } else {
                println!("{}", report.render_text());
            }
            std::process::exit(1);
        }
        Commands::Version => {
            println!("imposter {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start(args: StartArgs) -> Result<(), anyhow::Error> {
    let config = match &args.config_file {
        Some(path) => Config::from_file(path).context("could not load configuration")?,
        None => {
            warn!("No configuration file given; every request will answer 404");
            Config::default()
        }
    };
    if let Some(record) = &args.record {
        info!("Recording key: {}", record);
    }

    let server = ImposterServer::new(&config, args.options())?;
    server.run().await
}

fn load_config(source: &str) -> Result<Config, anyhow::Error> {
    if source == "stdin" {
        Config::from_stdin()
    } else {
        Config::from_file(source)
    }
}
