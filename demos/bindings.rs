//! Memoized bindings and reloads

use envapt::{Binding, EnvValue, Envapter};

static WORKERS: Binding<u32> = Binding::new("WORKERS").with_fallback(|| EnvValue::Number(4.0));
static LOG_LEVEL: Binding<Option<String>> = Binding::new("LOG_LEVEL");

fn main() -> anyhow::Result<()> {
    std::env::set_var("WORKERS", "8");

    let env = Envapter::load()?;
    println!("workers: {}", WORKERS.get(&env)?);
    println!("log level: {:?}", LOG_LEVEL.get(&env)?);

    // A reload is a new snapshot; bindings recompute against it
    std::env::set_var("WORKERS", "16");
    std::env::set_var("LOG_LEVEL", "debug");
    let env = env.reload()?;
    println!("workers after reload: {}", WORKERS.get(&env)?);
    println!("log level after reload: {:?}", LOG_LEVEL.get(&env)?);

    Ok(())
}
