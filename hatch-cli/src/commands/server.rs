//! `hatch server`

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use hatch_core::Settings;
use hatch_server::http::server::ROUTES;

#[derive(Args, Debug)]
pub struct ServerArgs {
    #[command(subcommand)]
    pub command: ServerCommand,
}

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    /// Run the HTTP server
    Run(RunArgs),
    /// List all registered routes
    Routes,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Host to bind (default: HOST or 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (default: PORT or 8000)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Enable auto-reload (not supported, restart the process instead)
    #[arg(long, short = 'r')]
    pub reload: bool,

    /// Number of runtime worker threads
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,
}

pub fn run_server<F>(args: &ServerArgs, mut settings: Settings, runtime: F) -> Result<()>
where
    F: FnOnce(Option<usize>) -> Result<tokio::runtime::Runtime>,
{
    match &args.command {
        ServerCommand::Routes => {
            for (method, path) in ROUTES {
                println!("{method:<7} {path}");
            }
            Ok(())
        }
        ServerCommand::Run(run) => {
            if let Some(host) = &run.host {
                settings.server.host = host.clone();
            }
            if let Some(port) = run.port {
                settings.server.port = port;
            }

            let runtime = runtime(run.workers)?;
            // Dropping the guard flushes the log files
            let _guard = hatch_core::logging::init_server_logging(&settings.logging, settings.app.debug)
                .context("Failed to initialize logging")?;

            if run.reload {
                tracing::warn!("--reload is not supported; restart the process to pick up changes");
            }
            println!("Starting server at http://{}", settings.server.bind_addr());

            runtime
                .block_on(hatch_server::serve(Arc::new(settings)))
                .context("Server error")
        }
    }
}
