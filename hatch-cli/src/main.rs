//! hatch CLI - operator tooling for the hatch API
//!
//! - `server`: run the HTTP API, list its routes
//! - `db`: generate and apply migrations, stamp, seed, reset
//! - `version`, `info`: what is configured
//! - `completions`: shell completion scripts

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hatch_core::Settings;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "hatch",
    author,
    version,
    about = "Operator CLI for the hatch API",
    long_about = "Run the users API, manage its schema migrations and inspect its configuration."
)]
struct Cli {
    /// Settings file (default: $HATCH_CONFIG or ./hatch.toml)
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose console logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Server management commands
    Server(commands::server::ServerArgs),
    /// Database management commands
    Db(commands::db::DbArgs),
    /// Show application version
    Version,
    /// Show application configuration info
    Info,
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    Settings::load(cli.config.as_deref()).context("Failed to load settings")
}

fn runtime(workers: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = workers {
        builder.worker_threads(workers.max(1));
    }
    builder
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Completions(args) => run_completions(args),
        Commands::Server(args) => {
            let settings = load_settings(&cli)?;
            commands::run_server(args, settings, runtime)
        }
        Commands::Db(args) => {
            let settings = load_settings(&cli)?;
            hatch_core::logging::init_console(cli.verbose || settings.app.debug)
                .context("Failed to initialise logging")?;
            runtime(None)?.block_on(commands::run_db(args, &settings))
        }
        Commands::Version => {
            let settings = load_settings(&cli)?;
            println!("{} v{}", settings.app.name, settings.app.version);
            Ok(())
        }
        Commands::Info => {
            let settings = load_settings(&cli)?;
            commands::info::run_info(&settings);
            Ok(())
        }
    }
}

fn run_completions(args: &CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
