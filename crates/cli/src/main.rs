//! OData Compliance CLI - Main Entry Point
//!
//! Runs the OData v4 compliance suites against a live service and reports
//! one outcome per test.
//!
//! Exit codes: 0 when nothing failed, 1 when any test failed, 2 when the
//! run could not start (bad configuration, server never became ready).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use odata_compliance_harness::readiness::wait_until_ready;
use odata_compliance_harness::{HarnessConfig, ReseedConfig, Session};

mod output;

use output::OutputFormat;

/// OData v4 compliance test runner
#[derive(Parser, Debug)]
#[command(name = "odata-compliance")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "ODATA_COMPLIANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Service root of the server under test
    #[arg(long, env = "ODATA_COMPLIANCE_BASE_URL")]
    base_url: Option<String>,

    /// Header sent with every request, as `Name:Value` (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Whole-run timeout in seconds; unfinished tests are skipped
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    request_timeout: Option<u64>,

    /// Per-test timeout in seconds; an overrunning test fails
    #[arg(long, value_name = "SECS")]
    test_timeout: Option<u64>,

    /// Only run suites whose title matches this regex
    #[arg(long, value_name = "REGEX")]
    suite: Option<String>,

    /// Only run tests whose name matches this regex
    #[arg(long, value_name = "REGEX")]
    test: Option<String>,

    /// Number of suites to run at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// POST here before each suite to reset the server's data
    #[arg(long, env = "ODATA_COMPLIANCE_RESEED_URL", conflicts_with = "reseed_command")]
    reseed_url: Option<String>,

    /// Run this shell command before each suite to reset the server's data
    #[arg(long)]
    reseed_command: Option<String>,

    /// Do not wait for the server to answer before starting
    #[arg(long)]
    no_wait: bool,

    /// Output format
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Also write the full results as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List suites and tests without running them
    #[arg(long)]
    list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Layer command-line flags over the config file.
fn build_config(cli: &Cli) -> anyhow::Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    for (name, value) in &cli.headers {
        config
            .default_headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        config.default_headers.insert(name.clone(), value.clone());
    }
    if cli.timeout.is_some() {
        config.run_timeout_secs = cli.timeout;
    }
    if cli.request_timeout.is_some() {
        config.request_timeout_secs = cli.request_timeout;
    }
    if cli.test_timeout.is_some() {
        config.test_timeout_secs = cli.test_timeout;
    }
    if cli.suite.is_some() {
        config.filter.suite = cli.suite.clone();
    }
    if cli.test.is_some() {
        config.filter.test = cli.test.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.suite_concurrency = concurrency;
    }
    if let Some(url) = &cli.reseed_url {
        config.reseed = Some(ReseedConfig::Http { url: url.clone() });
    }
    if let Some(command) = &cli.reseed_command {
        config.reseed = Some(ReseedConfig::Command {
            command: command.clone(),
        });
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn wait_for_server(session: &Session, timeout: Duration, format: OutputFormat) -> anyhow::Result<()> {
    let spinner = (format == OutputFormat::Table).then(|| {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Waiting for {}", session.base_url()));
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    });

    let result = wait_until_ready(session, timeout).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    Ok(result?)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = build_config(&cli)?;
    let registry = odata_compliance_suites::registry().context("failed to register suites")?;
    let session = Session::new(&config).context("failed to create session")?;

    if cli.list {
        output::print_list(&output::listing(&registry, session.filter()), cli.format);
        return Ok(ExitCode::SUCCESS);
    }

    if !cli.no_wait {
        wait_for_server(&session, config.readiness_timeout(), cli.format).await?;
    }

    let interrupt = {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, skipping remaining tests");
                session.cancel("run interrupted");
            }
        })
    };

    let result = registry.run_all(&session).await;
    interrupt.abort();

    if session.is_cancelled() {
        output::print_warning(&format!("Run stopped early: {}", session.cancel_reason()));
    }
    output::print_run(&result, cli.format);

    if let Some(path) = &cli.output {
        result
            .write_json(path)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
    }

    info!("{} failure(s)", result.failures().count());
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
