//! jlpt-health — 等待后端就绪并可选地执行一次 GET 请求
//!
//! Usage:
//!   jlpt-health                  Wait until the backend health endpoint answers 200
//!   jlpt-health --path <path>    Then GET <path> through the client and print `data`

use anyhow::{bail, Context};
use jlpt_api_client::telemetry::init_tracing;
use jlpt_api_client::{ApiClientBuilder, ClientConfig};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("help" | "--help" | "-h") => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Some("version" | "--version" | "-V") => {
            println!("jlpt-health {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    init_tracing("info");

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!(
        r#"jlpt-health — backend readiness check

USAGE:
    jlpt-health [--path <path>]

OPTIONS:
    --path <path>               GET this path once the backend is ready and print its data
    -h, --help                  Show this help message
    -V, --version               Show version information

ENVIRONMENT:
    JLPT_API_BASE_URL           API root (required)
    JLPT_HEALTH_PATH            Health endpoint path (default /health)
    JLPT_HTTP_TIMEOUT_MS        Transport timeout in milliseconds
    JLPT_READY_MAX_ATTEMPTS     Health probes before giving up (default 5)
    JLPT_LOG                    Log filter (falls back to RUST_LOG)"#
    );
}

fn parse_path(args: &[String]) -> anyhow::Result<Option<String>> {
    let mut path = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--path" => match iter.next() {
                Some(p) => path = Some(p.clone()),
                None => bail!("--path requires a value"),
            },
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(path)
}

async fn run(args: &[String]) -> anyhow::Result<()> {
    let path = parse_path(args)?;
    let config = ClientConfig::from_env().context("loading configuration")?;
    let client = ApiClientBuilder::from_config(&config)
        .build()
        .context("building client")?;

    client
        .gate()
        .ensure_ready()
        .await
        .with_context(|| format!("waiting for {}", config.base_url))?;
    let state = client.gate().state();
    println!("ready after {} probe(s)", state.attempts);

    if let Some(path) = path {
        let data: serde_json::Value = client
            .get(&path)
            .await
            .map_err(|e| anyhow::anyhow!("GET {path}: {}", e.user_message()))?;
        println!("{}", serde_json::to_string_pretty(&data)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_optional_path() {
        assert_eq!(parse_path(&args(&[])).unwrap(), None);
        assert_eq!(
            parse_path(&args(&["--path", "/exams"])).unwrap().as_deref(),
            Some("/exams")
        );
        assert!(parse_path(&args(&["--path"])).is_err());
        assert!(parse_path(&args(&["--bogus"])).is_err());
    }
}
