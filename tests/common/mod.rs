#![allow(dead_code)]

use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use nila_cc_verify::prelude::*;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{pkcs8::DecodePrivateKey, RsaPrivateKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ISSUER_KEY_PEM: &str = include_str!("../fixtures/issuer_key.pem");
/// An unrelated key, for tokens the authorization server did not sign.
pub const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");

pub const CLIENT_ID: &str = "messaging-client";
pub const CLIENT_SECRET: &str = "secret";

pub fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Signs access tokens the way a Spring-style authorization server does and
/// publishes the matching JWK.
pub struct TestIssuer {
    pub issuer: String,
    pub kid: String,
    encoding_key: EncodingKey,
    public_jwk: Value,
}

impl TestIssuer {
    pub fn new(issuer: &str) -> Self {
        Self::from_pem(ISSUER_KEY_PEM, issuer)
    }

    pub fn rogue(issuer: &str) -> Self {
        Self::from_pem(ROGUE_KEY_PEM, issuer)
    }

    pub fn from_pem(pem: &str, issuer: &str) -> Self {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem).expect("fixture key should be PKCS#8");
        let pkcs1_der = private_key.to_pkcs1_der().expect("fixture key should convert to PKCS#1");
        let encoding_key = EncodingKey::from_rsa_der(pkcs1_der.as_bytes());

        let public_key = private_key.to_public_key();
        let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());

        // JWK thumbprint (RFC 7638) as the kid.
        let canonical = serde_json::to_string(&json!({ "e": e, "kty": "RSA", "n": n })).unwrap();
        let kid = URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()));

        let public_jwk = json!({
            "kty": "RSA",
            "e": e,
            "n": n,
            "kid": kid,
            "alg": "RS256",
            "use": "sig",
        });

        Self {
            issuer: issuer.to_string(),
            kid,
            encoding_key,
            public_jwk,
        }
    }

    /// Signs with this key but claims to be `kid`.
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self.public_jwk["kid"] = json!(kid);
        self
    }

    pub fn jwk(&self) -> Value {
        self.public_jwk.clone()
    }

    pub fn jwks_json(&self) -> Value {
        json!({ "keys": [self.public_jwk] })
    }

    pub fn jwks(&self) -> JsonWebKeySet {
        serde_json::from_value(self.jwks_json()).unwrap()
    }

    /// A valid claim set for `audience`, issued now and valid for five minutes.
    pub fn claims(&self, audience: &str) -> Value {
        let now = now();
        json!({
            "iss": self.issuer,
            "sub": audience,
            "aud": audience,
            "nbf": now,
            "iat": now,
            "exp": now + 300,
            "jti": Uuid::new_v4().to_string(),
            "scope": ["message.read", "message.write"],
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with(Algorithm::RS256, Some(&self.kid), claims)
    }

    pub fn sign_with(&self, alg: Algorithm, kid: Option<&str>, claims: &Value) -> String {
        let mut header = Header::new(alg);
        header.kid = kid.map(String::from);
        encode(&header, claims, &self.encoding_key).expect("signing should succeed")
    }

    pub fn token_response(&self, access_token: &str) -> Value {
        json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 299,
            "scope": "message.read message.write",
        })
    }
}

/// Mounts a token endpoint accepting the default client and a JWKS endpoint.
pub async fn mount_authorization_server(server: &MockServer, issuer: &TestIssuer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(basic_auth(CLIENT_ID, CLIENT_SECRET))
        .respond_with(ResponseTemplate::new(200).set_body_json(issuer.token_response(access_token)))
        .mount(server)
        .await;
    mount_jwks(server, issuer.jwks_json()).await;
}

pub async fn mount_jwks(server: &MockServer, jwks: Value) {
    Mock::given(method("GET"))
        .and(path("/oauth2/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
        .mount(server)
        .await;
}

pub fn config_for(server: &MockServer) -> ConfigBuilder {
    ConfigBuilder::new().auth_server_url(server.uri())
}
