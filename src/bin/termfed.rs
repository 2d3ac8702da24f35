//! termfed CLI: query a federation of terminology services.
//!
//! Usage:
//!   termfed --config sources.yaml schemes [--language de]
//!   termfed --config sources.yaml sources

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use termfed::{AdapterRegistry, Federation, FederationConfig, HttpClient, ReqwestTransport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "termfed",
    version,
    about = "Federated access to terminology services"
)]
struct Cli {
    /// Path to a YAML or JSON federation config
    #[arg(long, short)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the merged concept schemes of all sources
    Schemes {
        /// Preferred label language
        #[arg(long)]
        language: Option<String>,
    },
    /// Initialize every source and show its capabilities
    Sources,
}

fn build_federation(config: &FederationConfig) -> Result<Federation, String> {
    let transport = ReqwestTransport::new(config.timeout())
        .map_err(|e| format!("Failed to create HTTP transport: {}", e))?;
    let http = HttpClient::builder(Arc::new(transport))
        .retry(config.retry.policy())
        .build();
    Federation::from_config(config, Arc::new(AdapterRegistry::with_defaults()), http)
        .map_err(|e| format!("Invalid configuration: {}", e))
}

async fn cmd_schemes(federation: &Federation, language: Option<String>) -> i32 {
    if let Some(language) = language {
        federation.set_languages(vec![language]);
    }
    let schemes = federation.schemes().await;
    if schemes.is_empty() {
        println!("No schemes found.");
        return 0;
    }
    println!("{:<48}  {:<32}  {}", "URI", "LABEL", "SOURCE");
    println!("{}", "-".repeat(100));
    for scheme in &schemes {
        let owner = scheme.owner();
        let languages = owner.as_ref().map(|o| o.languages()).unwrap_or_default();
        println!(
            "{:<48}  {:<32}  {}",
            scheme.uri,
            scheme.label(&languages).unwrap_or("-"),
            owner.as_ref().map(|o| o.uri()).unwrap_or("-")
        );
    }
    0
}

async fn cmd_sources(federation: &Federation) -> i32 {
    let mut code = 0;
    for source in federation.sources() {
        match source.capabilities().await {
            Ok(caps) => {
                let names: Vec<&str> = caps.enabled().iter().map(|c| c.name()).collect();
                println!("{} ({}): {}", source.uri(), source.kind().name(), names.join(", "));
            }
            Err(e) => {
                eprintln!("{} ({}): unavailable: {}", source.uri(), source.kind().name(), e);
                code = 1;
            }
        }
    }
    code
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("termfed=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match FederationConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let federation = match build_federation(&config) {
        Ok(federation) => federation,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Schemes { language } => cmd_schemes(&federation, language).await,
        Commands::Sources => cmd_sources(&federation).await,
    };
    std::process::exit(code);
}
