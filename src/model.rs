// src/model.rs

use crate::error::NilaVerifyError;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The successful response of the token endpoint (RFC 6749 §5.1).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// True when the access token has the three dot-separated segments of a compact JWS.
    pub fn is_compact_jwt(&self) -> bool {
        let segments: Vec<&str> = self.access_token.split('.').collect();
        segments.len() == 3 && segments[..2].iter().all(|s| !s.is_empty())
    }
}

/// An OAuth2 error body (RFC 6749 §5.2).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKey {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    // RSA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    // EC / OKP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl JsonWebKey {
    /// The algorithm the key is published for, if it declares one.
    pub fn algorithm(&self) -> Result<Option<Algorithm>, NilaVerifyError> {
        self.alg
            .as_deref()
            .map(|alg| {
                Algorithm::from_str(alg).map_err(|_| NilaVerifyError::UnknownAlgorithmName(alg.to_string()))
            })
            .transpose()
    }

    /// Whether this key type can verify signatures made with `alg`.
    pub fn supports(&self, alg: Algorithm) -> bool {
        match alg {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => self.kty == "RSA",
            Algorithm::ES256 | Algorithm::ES384 => self.kty == "EC",
            Algorithm::EdDSA => self.kty == "OKP",
            // Shared secrets are never published in a key set.
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => false,
        }
    }

    /// Builds the verification key from the public components of this JWK.
    pub fn decoding_key(&self) -> Result<DecodingKey, NilaVerifyError> {
        let key = match self.kty.as_str() {
            "RSA" => {
                let n = self.component(&self.n, "n")?;
                let e = self.component(&self.e, "e")?;
                DecodingKey::from_rsa_components(n, e)
            }
            "EC" => {
                let x = self.component(&self.x, "x")?;
                let y = self.component(&self.y, "y")?;
                DecodingKey::from_ec_components(x, y)
            }
            "OKP" => DecodingKey::from_ed_components(self.component(&self.x, "x")?),
            other => {
                return Err(NilaVerifyError::InvalidKeyFormat(format!(
                    "unsupported key type '{}'",
                    other
                )))
            }
        };
        key.map_err(|e| NilaVerifyError::InvalidKeyFormat(e.to_string()))
    }

    fn component<'a>(&self, value: &'a Option<String>, name: &str) -> Result<&'a str, NilaVerifyError> {
        value.as_deref().ok_or_else(|| {
            NilaVerifyError::InvalidKeyFormat(format!("{} key missing '{}' component", self.kty, name))
        })
    }
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Returns the key whose `kid` equals `kid`. Keys without a `kid` never match.
    pub fn find(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid))
    }
}
