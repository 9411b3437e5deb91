//! erp-plugins CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use erp_foundation::{CoreSettings, SettingsLoader};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// erp-plugins - inspect an ERP plugin catalog against a deployment
#[derive(Parser, Debug)]
#[command(name = "erp-plugins")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Directory holding one sub-directory per plugin package
    #[arg(short, long, default_value = "plugins")]
    catalog: PathBuf,

    /// Deployment file (JSON or TOML)
    #[arg(short = 'D', long, default_value = "deployment.json")]
    deployment: PathBuf,

    /// Core settings file (defaults to the layered .erp/settings.toml lookup)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate manifests and resolve dependencies without loading modules
    Check,
    /// Initialize the deployment and list every plugin with its status
    List,
    /// Aggregated routes of enabled plugins
    Routes,
    /// Aggregated sidebar menu of enabled plugins
    Menu,
    /// Aggregated dashboard widgets of enabled plugins
    Widgets,
    /// Aggregated permissions with role mappings applied
    Permissions,
    /// Print a plugin's effective configuration
    Config {
        /// Plugin id
        id: String,
        /// Dotted path inside the configuration
        path: Option<String>,
    },
    /// Translate a key through the merged bundles
    Translate {
        locale: String,
        namespace: String,
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let settings = load_settings(args.settings.as_ref())?;
    let output = cli::Output { json: args.json };

    match args.command {
        Command::Check => {
            let report = cli::check(&args.catalog, &args.deployment, &settings).await?;
            output.check(&report)?;
            if !report.passed() {
                std::process::exit(1);
            }
        }
        command => {
            let session = cli::Session::open(&args.catalog, &args.deployment, settings).await?;
            match command {
                Command::List => output.plugins(&session.plugins())?,
                Command::Routes => output.routes(&session.snapshot().routes)?,
                Command::Menu => output.menu(&session.snapshot().menu_items)?,
                Command::Widgets => output.widgets(&session.snapshot().widgets)?,
                Command::Permissions => output.permissions(&session.snapshot().permissions)?,
                Command::Config { id, path } => output.value(&session.config(&id, path.as_deref())?)?,
                Command::Translate {
                    locale,
                    namespace,
                    key,
                } => println!("{}", session.translate(&locale, &namespace, &key)),
                Command::Check => unreachable!("handled above"),
            }
        }
    }

    Ok(())
}

/// `--settings` 가 있으면 그 파일만, 없으면 레이어드 검색
fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<CoreSettings> {
    let loader = match path {
        Some(path) => SettingsLoader::with_paths(vec![path.clone()]),
        None => {
            let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            SettingsLoader::new(&working_dir)
        }
    };
    Ok(loader.load_all()?)
}
