// src/cli.rs

use crate::config::{Config, ConfigBuilder, FileConfig};
use crate::error::NilaVerifyError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Verify an OAuth2 client credentials setup end to end: request a token,
/// fetch the JWKS and verify the token's signature and claims.
///
/// Exit status: 0 on success, 1 configuration error, 2 transport error or
/// non-2xx response, 3 malformed response, 4 token verification failure.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "nila-cc-verify")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "NILA_CC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the authorization server [default: http://localhost:9000]
    #[arg(long, env = "NILA_CC_AUTH_SERVER_URL")]
    pub auth_server_url: Option<String>,

    /// OAuth2 client ID [default: messaging-client]
    #[arg(long, env = "NILA_CC_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth2 client secret [default: secret]
    #[arg(long, env = "NILA_CC_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Space-delimited scopes to request [default: "message.read message.write"]
    #[arg(long, env = "NILA_CC_SCOPES")]
    pub scopes: Option<String>,

    /// Expected `iss` claim [default: the authorization server URL]
    #[arg(long, env = "NILA_CC_ISSUER")]
    pub issuer: Option<String>,

    /// Expected `aud` claim [default: the client ID]
    #[arg(long, env = "NILA_CC_AUDIENCE")]
    pub audience: Option<String>,

    /// Token endpoint path under the server URL [default: /oauth2/token]
    #[arg(long)]
    pub token_path: Option<String>,

    /// JWKS endpoint path under the server URL [default: /oauth2/jwks]
    #[arg(long)]
    pub jwks_path: Option<String>,

    /// Timeout for each HTTP request, in seconds [default: 10]
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Clock skew tolerated when checking `exp`/`nbf`, in seconds, at most one day [default: 0]
    #[arg(long)]
    pub leeway_secs: Option<u64>,

    /// Comma-separated list of accepted signing algorithms [default: all asymmetric]
    #[arg(long, value_delimiter = ',')]
    pub algorithms: Option<Vec<String>>,

    /// Log filter for stderr output, e.g. `debug` or `nila_cc_verify=trace`
    #[arg(long, env = "NILA_CC_LOG")]
    pub log_level: Option<String>,

    /// Shorthand for `--log-level debug`
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Reads the config file named by `--config`, if any.
    pub fn load_file_config(&self) -> Result<Option<FileConfig>, NilaVerifyError> {
        self.config.as_deref().map(FileConfig::load).transpose()
    }

    /// The log filter to install: flag/env first, then `-v`, then the file, then `warn`.
    pub fn log_filter(&self, file: Option<&FileConfig>) -> String {
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        if self.verbose {
            return "debug".to_string();
        }
        file.and_then(|f| f.logging.as_ref())
            .and_then(|l| l.level.clone())
            .unwrap_or_else(|| "warn".to_string())
    }

    /// Layers the flags over the file config and builds the run configuration.
    pub fn build_config(&self, file: Option<&FileConfig>) -> Result<Config, NilaVerifyError> {
        let mut builder = match file {
            Some(file) => ConfigBuilder::from_file(file)?,
            None => ConfigBuilder::new(),
        };

        if let Some(url) = &self.auth_server_url {
            builder = builder.auth_server_url(url);
        }
        if let Some(client_id) = &self.client_id {
            builder = builder.client_id(client_id);
        }
        if let Some(secret) = &self.client_secret {
            builder = builder.client_secret(secret);
        }
        if let Some(scopes) = &self.scopes {
            builder = builder.scopes(scopes);
        }
        if let Some(issuer) = &self.issuer {
            builder = builder.issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            builder = builder.audience(audience);
        }
        if let Some(path) = &self.token_path {
            builder = builder.token_path(path);
        }
        if let Some(path) = &self.jwks_path {
            builder = builder.jwks_path(path);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.leeway_secs {
            builder = builder.leeway(Duration::from_secs(secs));
        }
        if let Some(names) = &self.algorithms {
            builder = builder.algorithm_names(names)?;
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;

    #[test]
    fn flags_parse_into_config() {
        let cli = Cli::try_parse_from([
            "nila-cc-verify",
            "--auth-server-url",
            "http://auth.test:8080",
            "--client-id",
            "reporting",
            "--algorithms",
            "RS256,PS256",
            "--timeout-secs",
            "2",
        ])
        .unwrap();
        let config = cli.build_config(None).unwrap();
        assert_eq!(config.client_id, "reporting");
        assert_eq!(config.audience, "reporting");
        assert_eq!(config.issuer, "http://auth.test:8080");
        assert_eq!(config.validation.algorithms, vec![Algorithm::RS256, Algorithm::PS256]);
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn log_filter_precedence() {
        let file: FileConfig = serde_yaml::from_str("logging:\n  level: info\n").unwrap();
        let mut cli = Cli::default();
        assert_eq!(cli.log_filter(None), "warn");
        assert_eq!(cli.log_filter(Some(&file)), "info");
        cli.verbose = true;
        assert_eq!(cli.log_filter(Some(&file)), "debug");
        cli.log_level = Some("trace".into());
        assert_eq!(cli.log_filter(Some(&file)), "trace");
    }
}
