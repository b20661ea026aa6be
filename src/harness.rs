// src/harness.rs

use crate::client::AuthServerClient;
use crate::config::Config;
use crate::error::NilaVerifyError;
use crate::model::{JsonWebKeySet, TokenResponse};
use crate::report::Reporter;
use crate::validator::{Validator, VerifiedToken};
use std::fmt;
use std::io::Write;
use thiserror::Error;
use tracing::{error, info};

/// The three steps of a verification run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AcquireToken,
    FetchJwks,
    VerifyToken,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::AcquireToken, Step::FetchJwks, Step::VerifyToken];

    pub fn number(self) -> u8 {
        match self {
            Step::AcquireToken => 1,
            Step::FetchJwks => 2,
            Step::VerifyToken => 3,
        }
    }

    pub(crate) fn success_line(self) -> &'static str {
        match self {
            Step::AcquireToken => "Access token acquired with the client credentials grant",
            Step::FetchJwks => "Public keys fetched from the JWKS endpoint",
            Step::VerifyToken => "Access token signature and claims verified",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::AcquireToken => "Acquire access token",
            Step::FetchJwks => "Fetch JWKS",
            Step::VerifyToken => "Verify access token",
        })
    }
}

/// The first failure of a run and the step it happened in.
#[derive(Debug, Error)]
#[error("{step} failed: {error}")]
pub struct StepFailure {
    pub step: Step,
    #[source]
    pub error: NilaVerifyError,
}

impl StepFailure {
    pub fn exit_code(&self) -> u8 {
        self.error.category().exit_code()
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub token: TokenResponse,
    pub jwks: JsonWebKeySet,
    pub verified: VerifiedToken,
}

fn at(step: Step) -> impl Fn(NilaVerifyError) -> StepFailure {
    move |error| StepFailure { step, error }
}

/// Runs acquire → fetch keys → verify, reporting progress as it goes.
///
/// Each step's output is passed to the next explicitly. The run stops at the first
/// failure, which is reported and returned.
pub async fn run<W: Write>(config: &Config, reporter: &mut Reporter<W>) -> Result<RunSummary, StepFailure> {
    let result = run_steps(config, reporter).await;
    if let Err(failure) = &result {
        error!(step = %failure.step, "{}", failure.error);
        if let Err(e) = reporter.failure(failure.step, &failure.error) {
            error!("Failed to write report: {}", e);
        }
    }
    result
}

async fn run_steps<W: Write>(config: &Config, reporter: &mut Reporter<W>) -> Result<RunSummary, StepFailure> {
    reporter.banner(config).map_err(NilaVerifyError::from).map_err(at(Step::AcquireToken))?;

    let client = AuthServerClient::new(config).map_err(at(Step::AcquireToken))?;

    let token = acquire_token(&client, config, reporter).await.map_err(at(Step::AcquireToken))?;
    let jwks = fetch_keys(&client, config, reporter).await.map_err(at(Step::FetchJwks))?;
    let verified = verify_token(config, &token, &jwks, reporter).map_err(at(Step::VerifyToken))?;

    reporter.summary().map_err(NilaVerifyError::from).map_err(at(Step::VerifyToken))?;
    info!("All verification steps passed");

    Ok(RunSummary { token, jwks, verified })
}

async fn acquire_token<W: Write>(
    client: &AuthServerClient<'_>,
    config: &Config,
    reporter: &mut Reporter<W>,
) -> Result<TokenResponse, NilaVerifyError> {
    reporter.step(Step::AcquireToken)?;
    reporter.token_request(config)?;
    let token = client.request_token().await?;
    reporter.token_acquired(&token)?;
    Ok(token)
}

async fn fetch_keys<W: Write>(
    client: &AuthServerClient<'_>,
    config: &Config,
    reporter: &mut Reporter<W>,
) -> Result<JsonWebKeySet, NilaVerifyError> {
    reporter.step(Step::FetchJwks)?;
    reporter.jwks_request(config)?;
    let jwks = client.fetch_jwks().await?;
    reporter.jwks_fetched(&jwks)?;
    Ok(jwks)
}

fn verify_token<W: Write>(
    config: &Config,
    token: &TokenResponse,
    jwks: &JsonWebKeySet,
    reporter: &mut Reporter<W>,
) -> Result<VerifiedToken, NilaVerifyError> {
    reporter.step(Step::VerifyToken)?;
    let verified = Validator::new(config).verify(&token.access_token, jwks)?;
    reporter.token_verified(&verified)?;
    Ok(verified)
}
