// src/error.rs

use jsonwebtoken::Algorithm;
use thiserror::Error;

/// The primary error type for the `nila-cc-verify` harness.
#[derive(Debug, Error)]
pub enum NilaVerifyError {
    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The request never produced a response (connection refused, timeout, TLS...).
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status. `body` is the payload verbatim.
    #[error("{endpoint} responded with HTTP {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The server answered 2xx but the body is not what the endpoint promises.
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    /// The token is not a well-formed compact JWS.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The JWT header is missing the required 'kid' (Key ID) field.
    #[error("The JWT header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    /// A key with the specified 'kid' was not found in the JSON Web Key Set.
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),

    /// The key matching the 'kid' is published for a use other than signing.
    #[error("Key '{kid}' is published for '{key_use}', not for signature verification")]
    KeyNotForSigning { kid: String, key_use: String },

    /// A cryptographic key (JWK) is malformed or invalid.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The algorithm in the JWT header is not in the allowed list.
    #[error("Unsupported algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    /// The JWK advertises an `alg` this harness cannot interpret.
    #[error("Unknown algorithm name in JWK: {0}")]
    UnknownAlgorithmName(String),

    /// The JWK's `alg` and the token header's `alg` disagree.
    #[error("Algorithm mismatch: token header says {header:?}, key '{kid}' is for {key:?}")]
    AlgorithmMismatch {
        kid: String,
        header: Algorithm,
        key: Algorithm,
    },

    /// The key type cannot verify signatures made with the token's algorithm.
    #[error("Key type '{kty}' cannot verify {alg:?} signatures")]
    UnsupportedKeyTypeForAlgorithm { kty: String, alg: Algorithm },

    /// The signature does not match the selected key.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The `exp` claim is in the past.
    #[error("Token has expired")]
    TokenExpired,

    /// The `nbf` claim is in the future.
    #[error("Token is not valid yet (nbf is in the future)")]
    TokenNotYetValid,

    /// A required claim is missing from the token.
    #[error("A required claim is missing from the token: {0}")]
    MissingRequiredClaim(String),

    /// A claim's value does not match the expected value.
    #[error("Claim '{claim}' value mismatch. Expected: {expected}, Actual: {actual}")]
    ClaimMismatch {
        claim: String,
        expected: serde_json::Value,
        actual: serde_json::Value,
    },

    /// Failed to deserialize the verified claims into `Claims`.
    #[error("Failed to deserialize claims: {0}")]
    ClaimDeserializationError(String),

    /// Any other error from the `jsonwebtoken` crate.
    #[error("JWT validation error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Writing the console report failed.
    #[error("Failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

/// Coarse grouping of [`NilaVerifyError`] used to pick the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    MalformedResponse,
    Verification,
}

impl ErrorCategory {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorCategory::Configuration => 1,
            ErrorCategory::Transport => 2,
            ErrorCategory::MalformedResponse => 3,
            ErrorCategory::Verification => 4,
        }
    }
}

impl NilaVerifyError {
    pub fn category(&self) -> ErrorCategory {
        use NilaVerifyError::*;
        match self {
            InvalidUrl(_)
            | MissingConfiguration(_)
            | InvalidConfiguration(_)
            | HttpClient(_)
            | Report(_) => ErrorCategory::Configuration,
            Transport { .. } | UnexpectedStatus { .. } => ErrorCategory::Transport,
            MalformedResponse { .. } => ErrorCategory::MalformedResponse,
            MalformedToken(_)
            | MissingKeyId
            | KeyNotFound(_)
            | KeyNotForSigning { .. }
            | InvalidKeyFormat(_)
            | UnsupportedAlgorithm(_)
            | UnknownAlgorithmName(_)
            | AlgorithmMismatch { .. }
            | UnsupportedKeyTypeForAlgorithm { .. }
            | InvalidSignature
            | TokenExpired
            | TokenNotYetValid
            | MissingRequiredClaim(_)
            | ClaimMismatch { .. }
            | ClaimDeserializationError(_)
            | Jwt(_) => ErrorCategory::Verification,
        }
    }

    /// The server's payload, for errors that carry one.
    pub fn server_body(&self) -> Option<&str> {
        match self {
            NilaVerifyError::UnexpectedStatus { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_category() {
        let status = NilaVerifyError::UnexpectedStatus {
            endpoint: "http://localhost:9000/oauth2/token".into(),
            status: 401,
            body: r#"{"error":"invalid_client"}"#.into(),
        };
        assert_eq!(status.category(), ErrorCategory::Transport);
        assert_eq!(status.category().exit_code(), 2);
        assert_eq!(status.server_body(), Some(r#"{"error":"invalid_client"}"#));

        assert_eq!(NilaVerifyError::TokenExpired.category().exit_code(), 4);
        assert_eq!(NilaVerifyError::MissingConfiguration("client_id".into()).category().exit_code(), 1);
        assert_eq!(NilaVerifyError::TokenExpired.server_body(), None);
    }
}
