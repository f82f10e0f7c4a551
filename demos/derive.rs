//! Declarative configuration with `#[derive(Envapt)]`

use envapt::{ArrayConverter, ConverterKind, Envapt};
use std::time::Duration;

#[derive(Debug, Envapt)]
#[envapt(prefix = "APP_")]
struct Config {
    // Loaded from APP_DATABASE_URL
    pub database_url: String,

    #[envapt(fallback = 8080)]
    pub port: u16,

    #[envapt(name = "REQUEST_TIMEOUT", converter = ConverterKind::Time, fallback = 30_000)]
    pub timeout: Duration,

    #[envapt(converter = ArrayConverter::default())]
    pub allowed_origins: Vec<String>,

    // None when APP_SENTRY_DSN is not set
    pub sentry_dsn: Option<url::Url>,
}

fn main() -> anyhow::Result<()> {
    std::env::set_var("APP_DATABASE_URL", "postgres://localhost/mydb");
    std::env::set_var("APP_REQUEST_TIMEOUT", "2m");
    std::env::set_var("APP_ALLOWED_ORIGINS", "https://a.example, https://b.example");

    let config = Config::from_env()?;
    println!("{config:#?}");

    Ok(())
}
