//! Built-in, array and custom converters

use envapt::{ArrayConverter, ConverterKind, EnvValue, Envapter, PrimitiveKind};

fn main() -> anyhow::Result<()> {
    let env = Envapter::from_vars([
        ("TIMEOUT", "30s"),
        ("RETRIES", "3 attempts"),
        ("ALLOWED_HOSTS", "api.example.com, cdn.example.com"),
        ("WEIGHTS", "0.2|0.3|0.5"),
        ("FEATURES", r#"{"beta": true, "limit": 20}"#),
        ("PATTERN", "/^user-\\d+$/i"),
        ("RELEASED", "2024-05-01T12:00:00.000Z"),
        ("PORT", "80"),
    ]);

    let timeout = env.get_using("TIMEOUT", ConverterKind::Time, Some(EnvValue::Number(5000.0)))?;
    println!("timeout (ms): {timeout:?}");

    let retries = env.get_using("RETRIES", ConverterKind::Integer, None)?;
    println!("retries: {retries:?}");

    let hosts = env.get_using("ALLOWED_HOSTS", ArrayConverter::default(), None)?;
    println!("hosts: {hosts:?}");

    let weights = env.get_using(
        "WEIGHTS",
        ArrayConverter::new("|").of(ConverterKind::Number),
        Some(EnvValue::from(vec![1.0])),
    )?;
    println!("weights: {weights:?}");

    let features = env.get_using("FEATURES", "json".parse::<envapt::ConverterSpec>()?, None)?;
    println!("features: {features:?}");

    if let Some(EnvValue::Regex(pattern)) = env.get_using("PATTERN", ConverterKind::Regexp, None)? {
        println!("pattern matches USER-42: {}", pattern.is_match("USER-42"));
    }

    let released = env.get_using("RELEASED", ConverterKind::Date, None)?;
    println!("released: {released:?}");

    // Primitive converters coerce the fallback instead of validating it
    let workers = env.get_using("WORKERS", PrimitiveKind::Number, Some(EnvValue::from("4")))?;
    println!("workers: {workers:?}");

    let port = env.get_with(
        "PORT",
        |raw, _| {
            let port: u16 = raw.parse()?;
            anyhow::ensure!(port >= 1024, "port {port} is privileged");
            Ok(EnvValue::from(port))
        },
        None,
    );
    println!("port: {port:?}");

    // A fallback that cannot come out of its converter is a configuration error
    let err = env
        .get_using("TIMEOUT", ConverterKind::Time, Some(EnvValue::from("soon")))
        .unwrap_err();
    println!("error {}: {err}", err.code());

    Ok(())
}
