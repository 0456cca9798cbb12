mod banner;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tablewright_config::{AppConfig, ConfigLoader, DATABASE_URL_ENV};
use tablewright_db::{
    AppTables, ConsoleProgress, Database, DryRun, FileLogSink, LogSink, Migration, MysqlDatabase,
    Plan, ProgressReporter, TracingLogSink,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Tablewright: re-runnable schema migrations for MySQL
#[derive(Parser, Debug)]
#[command(name = "tablewright", version, about)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON). Defaults to ./tablewright.yml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database URL, takes precedence over the configuration file
    #[arg(long, global = true, env = DATABASE_URL_ENV, hide_env_values = true)]
    database_url: Option<String>,

    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a migration plan against the database
    Apply {
        /// Plan file (YAML, TOML or JSON)
        plan: PathBuf,
    },
    /// Print the statements a plan would run without changing anything
    DryRun {
        /// Plan file (YAML, TOML or JSON)
        plan: PathBuf,
    },
    /// Parse and validate a plan without connecting
    Check {
        /// Plan file (YAML, TOML or JSON)
        plan: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout only carries migration progress.
fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Check { plan } => {
            let plan = load_plan(plan)?;
            banner::print_plan(&plan, None);
            println!("Plan {} is valid.", plan.version);
            Ok(())
        }
        Command::Apply { plan } => {
            let plan = load_plan(plan)?;
            let config = load_config(&cli)?;
            let db = connect(&config)?;
            banner::print_plan(&plan, Some("apply"));

            let log = FileLogSink::new(&config.log.dir);
            migrate(db, &config, &plan, Box::new(log))?;
            info!("migration to {} finished", plan.version);
            Ok(())
        }
        Command::DryRun { plan } => {
            let plan = load_plan(plan)?;
            let config = load_config(&cli)?;
            let db = connect(&config)?;
            banner::print_plan(&plan, Some("dry run"));

            let dry = migrate(DryRun::new(db), &config, &plan, Box::new(TracingLogSink))?;
            println!();
            for (sql, params) in dry.statements() {
                println!("{sql};");
                if !params.is_empty() {
                    let values: Vec<String> = params.iter().map(ToString::to_string).collect();
                    println!("  -- parameters: {}", values.join(", "));
                }
            }
            println!("-- {} statement(s), nothing was changed", dry.statements().len());
            Ok(())
        }
    }
}

fn load_plan(path: &Path) -> Result<Plan> {
    let plan = Plan::load(path)?;
    plan.validate()
        .with_context(|| format!("invalid plan {}", path.display()))?;
    Ok(plan)
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config =
        ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = &cli.database_url {
        config.database.url = Some(url.clone());
    }
    Ok(config)
}

fn connect(config: &AppConfig) -> Result<MysqlDatabase> {
    let url = config
        .database
        .url
        .as_deref()
        .with_context(|| {
            format!("no database configured: set database.url or {DATABASE_URL_ENV}")
        })?;
    Ok(MysqlDatabase::connect(url)?)
}

fn migrate<D: Database>(
    db: D,
    config: &AppConfig,
    plan: &Plan,
    log: Box<dyn LogSink>,
) -> Result<D> {
    let reporter = ProgressReporter::new(plan.version.clone(), Box::new(ConsoleProgress), log);
    let mut migration = Migration::new(db, reporter)
        .with_tables(AppTables::with_prefix(&config.migration.table_prefix));
    migration.set_context(config.migration.context.as_str());

    migration
        .run_plan(plan)
        .with_context(|| format!("migration to {} stopped", plan.version))?;
    Ok(migration.into_database())
}
