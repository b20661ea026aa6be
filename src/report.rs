// src/report.rs

use crate::config::Config;
use crate::error::NilaVerifyError;
use crate::harness::Step;
use crate::model::{JsonWebKeySet, TokenResponse};
use crate::validator::VerifiedToken;
use chrono::DateTime;
use std::io::{self, Write};

const RULE_WIDTH: usize = 80;
const TOKEN_PREVIEW_CHARS: usize = 50;

/// Writes the human-readable progress report of a run.
///
/// Generic over the sink so tests can capture the output; the binary uses stdout.
pub struct Reporter<W: Write> {
    out: W,
}

impl Reporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rule(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", "=".repeat(RULE_WIDTH))
    }

    pub fn banner(&mut self, config: &Config) -> io::Result<()> {
        writeln!(self.out)?;
        self.rule()?;
        writeln!(self.out, "OAuth2 Client Credentials Flow verification")?;
        writeln!(self.out, "Authorization Server: {}", config.auth_server_url)?;
        self.rule()?;
        writeln!(self.out)
    }

    pub fn step(&mut self, step: Step) -> io::Result<()> {
        self.rule()?;
        writeln!(self.out, "Step {}: {}", step.number(), step)?;
        self.rule()
    }

    pub fn token_request(&mut self, config: &Config) -> io::Result<()> {
        writeln!(self.out, "Token Endpoint: {}", config.token_endpoint)?;
        writeln!(self.out, "Client ID: {}", config.client_id)?;
        writeln!(self.out, "Client Secret: {}", mask(&config.client_secret))?;
        writeln!(self.out, "Scopes: {}", config.scopes)?;
        writeln!(self.out)
    }

    pub fn token_acquired(&mut self, token: &TokenResponse) -> io::Result<()> {
        writeln!(self.out, "✅ Access token acquired")?;
        writeln!(self.out, "Token Type: {}", token.token_type)?;
        match token.expires_in {
            Some(seconds) => writeln!(self.out, "Expires In: {} seconds", seconds)?,
            None => writeln!(self.out, "Expires In: N/A")?,
        }
        writeln!(self.out, "Scope: {}", token.scope.as_deref().unwrap_or("N/A"))?;
        if !token.is_compact_jwt() {
            writeln!(self.out, "⚠️  Access token is not a three-segment compact JWT")?;
        }
        writeln!(
            self.out,
            "\nAccess Token (first {} characters): {}...",
            TOKEN_PREVIEW_CHARS,
            preview(&token.access_token)
        )?;
        writeln!(self.out)
    }

    pub fn jwks_request(&mut self, config: &Config) -> io::Result<()> {
        writeln!(self.out, "JWKS Endpoint: {}", config.jwks_endpoint)?;
        writeln!(self.out)
    }

    pub fn jwks_fetched(&mut self, jwks: &JsonWebKeySet) -> io::Result<()> {
        writeln!(self.out, "✅ JWKS fetched")?;
        writeln!(self.out, "Key count: {}", jwks.keys.len())?;
        for (i, key) in jwks.keys.iter().enumerate() {
            writeln!(self.out, "\nKey #{}:", i + 1)?;
            writeln!(self.out, "  Key Type: {}", key.kty)?;
            writeln!(self.out, "  Key ID: {}", key.kid.as_deref().unwrap_or("N/A"))?;
            writeln!(self.out, "  Algorithm: {}", key.alg.as_deref().unwrap_or("N/A"))?;
            writeln!(self.out, "  Use: {}", key.use_purpose.as_deref().unwrap_or("N/A"))?;
        }
        writeln!(self.out)
    }

    pub fn token_verified(&mut self, verified: &VerifiedToken) -> io::Result<()> {
        writeln!(self.out, "✅ Token verified")?;
        writeln!(self.out, "\nToken Header:")?;
        writeln!(self.out, "{}", to_pretty_json(&verified.header))?;
        writeln!(self.out, "\nToken Payload:")?;
        writeln!(self.out, "{}", to_pretty_json(&verified.claims))?;

        writeln!(self.out, "\nExpires At: {}", format_timestamp(verified.claims.exp))?;
        if let Some(iat) = verified.claims.iat {
            writeln!(self.out, "Issued At: {}", format_timestamp(iat))?;
        }
        let scopes = verified.claims.scopes();
        if !scopes.is_empty() {
            writeln!(self.out, "Granted Scopes: {}", scopes.join(" "))?;
        }
        writeln!(self.out)
    }

    pub fn failure(&mut self, step: Step, error: &NilaVerifyError) -> io::Result<()> {
        writeln!(self.out, "❌ {} failed: {}", step, error)?;
        if let Some(body) = error.server_body() {
            writeln!(self.out, "Error details: {}", body)?;
        }
        writeln!(self.out)
    }

    pub fn summary(&mut self) -> io::Result<()> {
        self.rule()?;
        writeln!(self.out, "Summary")?;
        self.rule()?;
        for step in Step::ALL {
            writeln!(self.out, "✅ {}. {}", step.number(), step.success_line())?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "All checks passed! 🎉")?;
        self.rule()?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// One `*` per character, so the length is visible but not the secret.
fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

fn preview(token: &str) -> String {
    token.chars().take(TOKEN_PREVIEW_CHARS).collect()
}

fn format_timestamp(epoch_seconds: u64) -> String {
    i64::try_from(epoch_seconds)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| epoch_seconds.to_string())
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {}>", e))
}
