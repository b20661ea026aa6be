// src/validator.rs

use crate::config::{Config, ValidationDetails};
use crate::error::NilaVerifyError;
use crate::model::{JsonWebKey, JsonWebKeySet};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, get_current_timestamp, Algorithm, Header, Validation};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, instrument};

/// The `aud` claim, which RFC 7519 allows to be a string or an array of strings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// The claims decoded from a verified access token.
///
/// Registered claims are typed; everything else the server put in the token is
/// kept in `extra`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Claims {
    pub iss: String,
    pub aud: Audience,
    #[serde(deserialize_with = "numeric_date")]
    pub exp: u64,
    #[serde(default, deserialize_with = "optional_numeric_date", skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, deserialize_with = "optional_numeric_date", skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Scopes granted by the token. Accepts the space-delimited `scope` string
    /// and the array form some servers emit.
    pub fn scopes(&self) -> Vec<String> {
        match self.extra.get("scope").or_else(|| self.extra.get("scp")) {
            Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            _ => Vec::new(),
        }
    }
}

/// An RFC 7519 NumericDate. Fractional seconds are rounded, the same way
/// `jsonwebtoken` reads `exp` and `nbf` when it validates them.
struct NumericDate(u64);

impl<'de> Deserialize<'de> for NumericDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NumericDateVisitor;

        impl<'de> Visitor<'de> for NumericDateVisitor {
            type Value = NumericDate;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a non-negative number of seconds since the epoch")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(NumericDate(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                u64::try_from(value)
                    .map(NumericDate)
                    .map_err(|_| E::custom("NumericDate must not be negative"))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
                if value.is_finite() && value >= 0.0 && value < u64::MAX as f64 {
                    Ok(NumericDate(value.round() as u64))
                } else {
                    Err(E::custom("NumericDate must be representable as a u64"))
                }
            }
        }

        deserializer.deserialize_any(NumericDateVisitor)
    }
}

fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    NumericDate::deserialize(deserializer).map(|date| date.0)
}

fn optional_numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<NumericDate>::deserialize(deserializer).map(|date| date.map(|date| date.0))
}

/// A token whose signature and claims passed verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub header: Header,
    pub claims: Claims,
}

// Helper function to decode JWT payload segment
fn decode_raw_payload_to_value(token_str: &str) -> Option<Value> {
    let payload_segment = token_str.split('.').nth(1)?;
    let decoded_payload_bytes = base64_url::decode(payload_segment).ok()?;
    serde_json::from_slice(&decoded_payload_bytes).ok()
}

/// Verifies access tokens against a fetched JSON Web Key Set.
///
/// The validator owns no key material: the key set is an explicit input of
/// [`Validator::verify`], so a run passes the result of the JWKS step straight in.
#[derive(Debug, Clone)]
pub struct Validator {
    issuer: String,
    audience: String,
    validation: ValidationDetails,
}

impl Validator {
    /// Creates a new `Validator` expecting the issuer and audience of `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            validation: config.validation.clone(),
        }
    }

    /// Verifies an access token.
    ///
    /// This method performs:
    /// 1. Key selection by the header's `kid`.
    /// 2. Algorithm resolution from the header and the selected key.
    /// 3. Signature verification.
    /// 4. Validation of `iss`, `aud`, `exp` (and `nbf` when present).
    #[instrument(skip(self, token, jwks), err)]
    pub fn verify(&self, token: &str, jwks: &JsonWebKeySet) -> Result<VerifiedToken, NilaVerifyError> {
        // 1. Decode header to get kid and alg without validation.
        let header = decode_header(token).map_err(|e| NilaVerifyError::MalformedToken(e.to_string()))?;
        let kid = header.kid.as_deref().ok_or(NilaVerifyError::MissingKeyId)?;

        let jwk = jwks
            .find(kid)
            .ok_or_else(|| NilaVerifyError::KeyNotFound(kid.to_string()))?;
        if let Some(key_use) = jwk.use_purpose.as_deref() {
            if key_use != "sig" {
                return Err(NilaVerifyError::KeyNotForSigning {
                    kid: kid.to_string(),
                    key_use: key_use.to_string(),
                });
            }
        }
        debug!(kid, kty = %jwk.kty, alg = ?header.alg, "Selected verification key");

        // 2. Resolve the algorithm and build the key.
        let alg = self.resolve_algorithm(kid, header.alg, jwk)?;
        let decoding_key = jwk.decoding_key()?;

        // 3. Construct validation options.
        let mut validation = Validation::new(alg);
        validation.leeway = self.validation.leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        // 4. Verify signature and registered claims.
        let token_data = decode::<Value>(token, &decoding_key, &validation)
            .map_err(|e| self.translate_jwt_error(token, e))?;

        let claims: Claims = serde_json::from_value(token_data.claims)
            .map_err(|e| NilaVerifyError::ClaimDeserializationError(e.to_string()))?;

        // 5. Reject `exp == now`, which `jsonwebtoken` lets through.
        let leeway = self.validation.leeway.as_secs();
        if claims
            .exp
            .checked_add(leeway)
            .is_some_and(|deadline| deadline <= get_current_timestamp())
        {
            return Err(NilaVerifyError::TokenExpired);
        }

        Ok(VerifiedToken { header: token_data.header, claims })
    }

    /// Picks the algorithm the token must be verified with.
    ///
    /// The header decides; a key that declares its own `alg` must agree with it,
    /// and the key type must belong to the algorithm's family.
    fn resolve_algorithm(&self, kid: &str, header_alg: Algorithm, jwk: &JsonWebKey) -> Result<Algorithm, NilaVerifyError> {
        if let Some(key_alg) = jwk.algorithm()? {
            if key_alg != header_alg {
                return Err(NilaVerifyError::AlgorithmMismatch {
                    kid: kid.to_string(),
                    header: header_alg,
                    key: key_alg,
                });
            }
        }
        if !self.validation.algorithms.contains(&header_alg) {
            return Err(NilaVerifyError::UnsupportedAlgorithm(header_alg));
        }
        if !jwk.supports(header_alg) {
            return Err(NilaVerifyError::UnsupportedKeyTypeForAlgorithm {
                kty: jwk.kty.clone(),
                alg: header_alg,
            });
        }
        Ok(header_alg)
    }

    /// Maps `jsonwebtoken` failures onto the distinct verification errors.
    fn translate_jwt_error(&self, token: &str, error: jsonwebtoken::errors::Error) -> NilaVerifyError {
        let actual = |claim: &str| {
            decode_raw_payload_to_value(token)
                .and_then(|payload| payload.get(claim).cloned())
                .unwrap_or(Value::Null)
        };
        match error.kind() {
            ErrorKind::InvalidSignature => NilaVerifyError::InvalidSignature,
            ErrorKind::ExpiredSignature => NilaVerifyError::TokenExpired,
            ErrorKind::ImmatureSignature => NilaVerifyError::TokenNotYetValid,
            ErrorKind::MissingRequiredClaim(claim) => NilaVerifyError::MissingRequiredClaim(claim.clone()),
            ErrorKind::InvalidAudience => NilaVerifyError::ClaimMismatch {
                claim: "aud".to_string(),
                expected: Value::String(self.audience.clone()),
                actual: actual("aud"),
            },
            ErrorKind::InvalidIssuer => NilaVerifyError::ClaimMismatch {
                claim: "iss".to_string(),
                expected: Value::String(self.issuer.clone()),
                actual: actual("iss"),
            },
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                NilaVerifyError::MalformedToken(error.to_string())
            }
            _ => NilaVerifyError::Jwt(error),
        }
    }
}
