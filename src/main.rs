// src/main.rs

use nila_cc_verify::cli::Cli;
use nila_cc_verify::prelude::*;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}' ({}), falling back to 'warn'", filter, e);
        EnvFilter::new("warn")
    });
    // stdout carries the report; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config_failure(error: NilaVerifyError) -> ExitCode {
    eprintln!("❌ {}", error);
    ExitCode::from(error.category().exit_code())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let file_config = match cli.load_file_config() {
        Ok(file_config) => file_config,
        Err(e) => return config_failure(e),
    };

    init_tracing(&cli.log_filter(file_config.as_ref()));

    let config = match cli.build_config(file_config.as_ref()) {
        Ok(config) => config,
        Err(e) => return config_failure(e),
    };
    tracing::debug!(token_endpoint = %config.token_endpoint, jwks_endpoint = %config.jwks_endpoint, issuer = %config.issuer, audience = %config.audience, "Configuration loaded");

    let mut reporter = Reporter::stdout();
    match run(&config, &mut reporter).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(failure) => ExitCode::from(failure.exit_code()),
    }
}
