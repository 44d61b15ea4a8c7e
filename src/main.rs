use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use tracing::{error, info};

use rig_switch::config::Config;
use rig_switch::credentials::{CredentialsProvider, SecretManagerCredentials, StaticCredentials};
use rig_switch::health::HealthChecker;
use rig_switch::logging::init_logging;
use rig_switch::metrics::MetricsCollector;
use rig_switch::server::RigServer;
use rig_switch::{ApiClient, Credentials, RigStateReconciler};

/// Start or stop a mining rig through the signed management API.
#[derive(Parser)]
#[command(name = "rig-switch", version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["activate", "deactivate", "serve"])))]
struct Cli {
    /// Api base url
    #[arg(short = 'b', long)]
    base_url: Option<String>,

    /// Organization id
    #[arg(short = 'o', long)]
    organization_id: Option<String>,

    /// Api key
    #[arg(short = 'k', long)]
    key: Option<String>,

    /// Secret for api key
    #[arg(short = 's', long)]
    secret: Option<String>,

    /// Rig ID to activate or deactivate
    #[arg(short = 'r', long = "rig", required_unless_present = "serve")]
    rig_id: Option<String>,

    /// Activate rig
    #[arg(short = 'a', long)]
    activate: bool,

    /// Deactivate rig
    #[arg(short = 'd', long)]
    deactivate: bool,

    /// Run the HTTP listener instead of a one-shot command
    #[arg(long)]
    serve: bool,

    /// Listen address for --serve
    #[arg(long)]
    listen: Option<String>,

    /// Load credentials from the secret store under this project
    #[arg(long)]
    secret_project: Option<String>,

    /// Log every request line
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    /// Flags win over environment.
    fn apply(&self, config: &mut Config) {
        if let Some(v) = &self.base_url {
            config.base_url = v.clone();
        }
        if let Some(v) = &self.organization_id {
            config.organization_id = Some(v.clone());
        }
        if let Some(v) = &self.key {
            config.api_key = Some(v.clone());
        }
        if let Some(v) = &self.secret {
            config.api_secret = Some(v.clone());
        }
        if let Some(v) = &self.listen {
            config.listen_addr = v.clone();
        }
        if let Some(v) = &self.secret_project {
            config.secret_project_id = Some(v.clone());
        }
        config.verbose |= self.verbose;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Unexpected error: {}", e);
            return ExitCode::from(1);
        }
    };
    cli.apply(&mut config);
    init_logging(&config.log_level);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Unexpected error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    config.validate()?;

    if cli.serve {
        return serve(config).await;
    }

    let rig_id = cli.rig_id.context("--rig is required")?;
    let credentials = load_credentials(&config).await?;
    let client = ApiClient::new(config.base_url.clone(), credentials).verbose(config.verbose);
    let reconciler = RigStateReconciler::new(client);

    let result = if cli.activate {
        reconciler.activate(&rig_id).await?
    } else {
        reconciler.deactivate(&rig_id).await?
    };

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

async fn load_credentials(config: &Config) -> anyhow::Result<Credentials> {
    let credentials = if config.secret_project_id.is_some() {
        SecretManagerCredentials::from_config(config)?.load().await?
    } else {
        StaticCredentials::from_config(config)?.load().await?
    };
    Ok(credentials)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    // Credentials are resolved once and stay immutable for the process lifetime
    let credentials = load_credentials(&config).await?;
    let client = ApiClient::new(config.base_url.clone(), credentials).verbose(config.verbose);
    let reconciler = Arc::new(RigStateReconciler::new(client));

    let metrics = Arc::new(MetricsCollector::new());
    let health = Arc::new(HealthChecker::new(metrics.clone(), config.clone()));
    let server = Arc::new(
        RigServer::new(reconciler, health, metrics).legacy_empty_error_body(config.legacy_empty_error_body),
    );

    info!(base_url = %config.base_url, "Starting rig server");
    server
        .start(&config.listen_addr)
        .await
        .with_context(|| format!("listener on {} failed", config.listen_addr))
}
