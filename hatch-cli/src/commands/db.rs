//! `hatch db`: migrations, seeding, reset

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use hatch_core::Settings;
use hatch_migrate::{MigrationOutcome, MigrationSet, Migrator, PgMigrationBackend, BASE, HEAD};
use hatch_server::db::{create_pool, PgUserStore};
use hatch_server::providers::LogOnlySender;
use hatch_server::services::SeedOutcome;
use hatch_server::{entity_schema, RequestContext, UserService};

#[derive(Args, Debug)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Generate a revision (with --message) or apply every pending one
    Migrate {
        /// Generate a new revision with this message instead of upgrading
        #[arg(long, short = 'm')]
        message: Option<String>,
    },
    /// Upgrade to a revision
    Upgrade {
        /// Target revision, prefix or `head`
        #[arg(default_value = HEAD)]
        revision: String,
    },
    /// Downgrade to a revision
    Downgrade {
        /// Target revision, prefix or `base`
        revision: String,
    },
    /// Roll back the last N revisions
    Rollback {
        /// Number of migrations to roll back
        #[arg(long, short = 's', default_value_t = 1)]
        steps: usize,
    },
    /// Record a revision as applied without running any script
    Stamp {
        /// Revision to stamp (default: head)
        #[arg(default_value = HEAD)]
        revision: String,
    },
    /// Show the current database revision
    Current,
    /// Show the revision history, newest first
    History {
        /// Connect to the database and mark the current revision
        #[arg(long)]
        show_current: bool,
    },
    /// Create a revision joining every head
    Merge {
        #[arg(long, short = 'm')]
        message: String,
    },
    /// Seed the database with the admin user
    Seed,
    /// Downgrade to base and upgrade to head again (deletes all data)
    Reset {
        /// Skip confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },
}

fn label(revision: Option<&str>) -> String {
    revision.map_or_else(|| format!("<{BASE}>"), str::to_owned)
}

fn load_set(settings: &Settings) -> Result<MigrationSet> {
    let dir = settings.migrations.dir.clone();
    MigrationSet::load(dir.clone())
        .with_context(|| format!("Failed to load migrations from {}", dir.display()))
}

async fn migrator(settings: &Settings) -> Result<Migrator<PgMigrationBackend>> {
    let set = load_set(settings)?;
    let backend = PgMigrationBackend::connect(&settings.database.url)
        .await
        .with_context(|| format!("Failed to connect to {}", settings.database.redacted_url()))?;
    Ok(Migrator::new(set, backend))
}

fn report(outcome: &MigrationOutcome) {
    if outcome.is_noop() {
        println!("Already at {}, nothing to do", label(outcome.to.as_deref()));
        return;
    }
    for revision in &outcome.applied {
        println!("  {} {}", outcome.direction, revision);
    }
    println!(
        "{} -> {} ({} revision(s))",
        label(outcome.from.as_deref()),
        label(outcome.to.as_deref()),
        outcome.applied.len()
    );
}

pub async fn run_db(args: &DbArgs, settings: &Settings) -> Result<()> {
    match &args.command {
        DbCommand::Migrate { message: Some(message) } => {
            let mut set = load_set(settings)?;
            println!("Generating migration: {message}");
            let entry = set.generate(message, &entity_schema())?;
            println!("Created revision {} ({})", entry.id, entry.upgrade);
        }
        DbCommand::Migrate { message: None } => {
            println!("Applying migrations...");
            report(&migrator(settings).await?.upgrade(HEAD).await?);
            println!("Migrations applied successfully!");
        }
        DbCommand::Upgrade { revision } => {
            report(&migrator(settings).await?.upgrade(revision).await?);
        }
        DbCommand::Downgrade { revision } => {
            report(&migrator(settings).await?.downgrade(revision).await?);
        }
        DbCommand::Rollback { steps } => {
            println!("Rolling back {steps} migration(s)...");
            report(&migrator(settings).await?.rollback(*steps).await?);
            println!("Rollback complete!");
        }
        DbCommand::Stamp { revision } => {
            let stamped = migrator(settings).await?.stamp(revision).await?;
            println!("Database stamped with revision {}", label(stamped.as_deref()));
        }
        DbCommand::Current => {
            let current = migrator(settings).await?.current().await?;
            println!("{}", label(current.as_deref()));
        }
        DbCommand::History { show_current } => {
            let history = if *show_current {
                let migrator = migrator(settings).await?;
                let current = migrator.current().await?;
                migrator.set().history(current.as_deref())
            } else {
                load_set(settings)?.history(None)
            };
            if history.is_empty() {
                println!("No revisions in {}", settings.migrations.dir.display());
            }
            for entry in history {
                println!("{entry}");
            }
        }
        DbCommand::Merge { message } => {
            let mut set = load_set(settings)?;
            let entry = set.merge(message)?;
            println!("Created merge revision {} of {}", entry.id, entry.parents.join(", "));
        }
        DbCommand::Seed => seed(settings).await?,
        DbCommand::Reset { force } => {
            if !force {
                let confirmed = inquire::Confirm::new("This will delete all data. Are you sure?")
                    .with_default(false)
                    .prompt()
                    .context("Confirmation aborted")?;
                if !confirmed {
                    bail!("Reset aborted");
                }
            }
            println!("Resetting database...");
            let (down, up) = migrator(settings).await?.reset().await?;
            report(&down);
            report(&up);
            println!("Database reset complete!");
        }
    }
    Ok(())
}

async fn seed(settings: &Settings) -> Result<()> {
    let pool = create_pool(&settings.database)
        .await
        .with_context(|| format!("Failed to connect to {}", settings.database.redacted_url()))?;
    let service = UserService::new(Arc::new(PgUserStore::new(pool.clone())), Arc::new(LogOnlySender));

    let outcome = service.seed_admin(&RequestContext::detached()).await;
    pool.close().await;

    match outcome? {
        SeedOutcome::AlreadyPresent(_) => println!("Admin user already exists, skipping seed."),
        SeedOutcome::Created(admin) => {
            println!("Database seeded successfully! Admin user id {}", admin.id)
        }
    }
    Ok(())
}
