use anyhow::Result;
use clap::{Parser, Subcommand};
use routekit::{run, ModuleRegistry, RunOptions, ShutdownOptions};
use routekit_bootstrap::{default_logging_config, AppConfig, AppConfigProvider, CliArgs};

use std::path::PathBuf;
use std::sync::Arc;

use excel_io::ExcelIoModule;

mod demo;

/// SheetPort Server - spreadsheet export and import for REST operations
#[derive(Parser)]
#[command(name = "sheetport-server")]
#[command(about = "SheetPort Server - spreadsheet export and import for REST operations")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
}

/// excel_io first, then every module that declares spreadsheet operations.
pub(crate) fn build_registry() -> Result<ModuleRegistry> {
    let excel = Arc::new(
        ExcelIoModule::new().with_wrapper(Arc::new(demo::ApiResponseWrapper)),
    );
    let users = Arc::new(demo::ExampleUsersModule);

    let mut b = ModuleRegistry::builder();
    b.register_core(ExcelIoModule::NAME, &[], excel.clone())
        .register_rest(ExcelIoModule::NAME, excel.clone())
        .register_stateful(ExcelIoModule::NAME, excel);
    b.register_core(demo::MODULE_NAME, &[ExcelIoModule::NAME], users.clone())
        .register_rest(demo::MODULE_NAME, users);

    Ok(b.build_topo_sorted()?)
}

fn load_config(cli: &Cli, args: &CliArgs) -> Result<AppConfig> {
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    let config = load_config(&cli, &args)?;

    let logging_config = config.logging.clone().unwrap_or_else(default_logging_config);
    routekit_bootstrap::init_logging(&logging_config, &config.server.home_path());

    tracing::info!("SheetPort Server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing modules…");

    let bind_addr = config.server.bind_addr()?;
    let request_timeout = config.server.request_timeout();

    let run_options = RunOptions {
        registry: build_registry()?,
        modules_cfg: Arc::new(AppConfigProvider::new(config)),
        bind_addr,
        request_timeout,
        shutdown: ShutdownOptions::Signals,
    };

    run(run_options).await
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    config.server.bind_addr()?;
    build_registry()?;
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}
