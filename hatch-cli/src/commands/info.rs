use hatch_core::Settings;

/// Print the effective configuration. Secrets are redacted.
pub fn run_info(settings: &Settings) {
    println!("Application Configuration:");
    println!("  Name: {}", settings.app.name);
    println!("  Version: {}", settings.app.version);
    println!("  Environment: {}", settings.app.environment);
    println!("  Debug: {}", settings.app.debug);
    println!("  Host: {}", settings.server.host);
    println!("  Port: {}", settings.server.port);
    println!("  Database: {}", settings.database.redacted_url());
    println!(
        "  Pool: {} (+{} overflow)",
        settings.database.pool_size, settings.database.max_overflow
    );
    println!("  Log level: {}", settings.logging.level);
    println!("  Log dir: {}", settings.logging.dir.display());
    match settings.mail.host.as_deref().filter(|_| settings.mail.is_configured()) {
        Some(host) => println!("  Mail: {}:{}", host, settings.mail.port),
        None => println!("  Mail: not configured (log only)"),
    }
    println!("  Migrations: {}", settings.migrations.dir.display());
}
