//! Basic usage example

use envapt::Envapter;

fn main() -> anyhow::Result<()> {
    // Set environment variables for demonstration
    std::env::set_var("DATABASE_URL", "postgres://localhost/mydb");
    std::env::set_var("MAX_CONNECTIONS", "25");
    std::env::set_var("ENVIRONMENT", "staging");

    // Load process variables and .env (when present)
    let env = Envapter::load()?;

    let database_url = env.get_or("DATABASE_URL", "sqlite::memory:")?;
    let max_connections = env.get_number_or("MAX_CONNECTIONS", 10.0)?;
    let debug_mode = env.get_boolean_or(["DEBUG", "VERBOSE"], false)?;

    println!("Configuration loaded ({}):", env.environment());
    println!("  Database URL: {database_url}");
    println!("  Max Connections: {max_connections}");
    println!("  Debug Mode: {debug_mode}");
    println!("  Staging: {}", env.is_staging());

    Ok(())
}
