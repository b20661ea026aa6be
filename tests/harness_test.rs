mod common;

use common::{config_for, mount_authorization_server, mount_jwks, TestIssuer, CLIENT_ID};
use nila_cc_verify::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn output(reporter: Reporter<Vec<u8>>) -> String {
    String::from_utf8(reporter.into_inner()).unwrap()
}

#[tokio::test]
async fn test_full_run_end_to_end() {
    // --- 1. SETUP MOCK AUTHORIZATION SERVER ---
    let mock_server = MockServer::start().await;
    let issuer = TestIssuer::new(&mock_server.uri());
    let access_token = issuer.sign(&issuer.claims(CLIENT_ID));
    mount_authorization_server(&mock_server, &issuer, &access_token).await;

    // --- 2. RUN ---
    let config = config_for(&mock_server).build().unwrap();
    let mut reporter = Reporter::new(Vec::new());
    let summary = run(&config, &mut reporter).await.expect("Run should pass");

    // --- 3. ASSERTIONS ---
    assert_eq!(summary.token.access_token, access_token);
    assert_eq!(summary.jwks.keys.len(), 1);
    assert_eq!(summary.verified.claims.iss, mock_server.uri());
    assert!(summary.verified.claims.aud.contains(CLIENT_ID));

    let out = output(reporter);
    assert!(out.contains(&format!("Authorization Server: {}/", mock_server.uri())));
    assert!(out.contains("Step 1: Acquire access token"));
    assert!(out.contains("Client Secret: ******"));
    assert!(!out.contains("Client Secret: secret"));
    assert!(out.contains(&format!("Key ID: {}", issuer.kid)));
    assert!(out.contains("Token Payload:"));
    assert!(out.contains("Granted Scopes: message.read message.write"));
    assert!(out.contains("All checks passed!"));
}

#[tokio::test]
async fn test_rejected_credentials_stop_the_run() {
    let mock_server = MockServer::start().await;
    let error_body = r#"{"error":"invalid_client","error_description":"Client authentication failed"}"#;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string(error_body))
        .mount(&mock_server)
        .await;
    // The JWKS endpoint must not be reached.
    Mock::given(method("GET"))
        .and(path("/oauth2/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server).client_secret("wrong").build().unwrap();
    let mut reporter = Reporter::new(Vec::new());
    let failure = run(&config, &mut reporter).await.unwrap_err();

    assert_eq!(failure.step, Step::AcquireToken);
    assert_eq!(failure.exit_code(), 2);
    let out = output(reporter);
    assert!(out.contains(&format!("Error details: {}", error_body)));
    assert!(!out.contains("All checks passed!"));
}

#[tokio::test]
async fn test_jwks_failure_is_attributed_to_fetch_step() {
    let mock_server = MockServer::start().await;
    let issuer = TestIssuer::new(&mock_server.uri());
    let access_token = issuer.sign(&issuer.claims(CLIENT_ID));
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issuer.token_response(&access_token)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth2/jwks"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let config = config_for(&mock_server).build().unwrap();
    let failure = run(&config, &mut Reporter::new(Vec::new())).await.unwrap_err();
    assert_eq!(failure.step, Step::FetchJwks);
    assert!(matches!(failure.error, NilaVerifyError::UnexpectedStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_unknown_kid_fails_verification_step() {
    let mock_server = MockServer::start().await;
    let issuer = TestIssuer::new(&mock_server.uri());
    let access_token = issuer.sign(&issuer.claims(CLIENT_ID));
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issuer.token_response(&access_token)))
        .mount(&mock_server)
        .await;
    // The server rotated its key: the published set no longer has the token's kid.
    let rotated = TestIssuer::rogue(&mock_server.uri());
    mount_jwks(&mock_server, rotated.jwks_json()).await;

    let config = config_for(&mock_server).build().unwrap();
    let mut reporter = Reporter::new(Vec::new());
    let failure = run(&config, &mut reporter).await.unwrap_err();

    assert_eq!(failure.step, Step::VerifyToken);
    assert!(matches!(&failure.error, NilaVerifyError::KeyNotFound(kid) if *kid == issuer.kid));
    assert_eq!(failure.exit_code(), 4);
    assert!(output(reporter).contains("❌ Verify access token failed: Key not found for kid"));
}

#[tokio::test]
async fn test_audience_mismatch_fails_run() {
    let mock_server = MockServer::start().await;
    let issuer = TestIssuer::new(&mock_server.uri());
    let access_token = issuer.sign(&issuer.claims("another-client"));
    mount_authorization_server(&mock_server, &issuer, &access_token).await;

    let config = config_for(&mock_server).build().unwrap();
    let failure = run(&config, &mut Reporter::new(Vec::new())).await.unwrap_err();

    assert_eq!(failure.step, Step::VerifyToken);
    assert!(matches!(&failure.error, NilaVerifyError::ClaimMismatch { claim, .. } if claim == "aud"));
    assert_ne!(failure.exit_code(), 0);
}
