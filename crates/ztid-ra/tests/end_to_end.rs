//! Register, issue, revoke and publish through the real HTTP surface.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use ztid_admin_client::{ClientError, RaClient};
use ztid_core::api::ErrorResponse;
use ztid_core::{RevocationReason, ServiceId};
use ztid_ra::crypto::{
    extract_identity_from_pem, init_ca, parse_crl_der, CaArtifacts, HierarchyConfig,
    INTERMEDIATE,
};
use ztid_ra::http::{create_crl_router, create_router, PKIX_CRL_CONTENT_TYPE};
use ztid_ra::{AppState, Config, RegistrationAuthority};

struct TestServer {
    _dir: tempfile::TempDir,
    artifacts: CaArtifacts,
    base_url: String,
}

async fn serve(router: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn start_ra() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let ca_dir = dir.path().join("ca");
    let artifacts = CaArtifacts::new(&ca_dir);
    init_ca(&artifacts, &HierarchyConfig::default()).unwrap();

    let config = Config {
        ca_dir,
        ..Config::default()
    };
    let ra = RegistrationAuthority::from_config(&config);
    ra.ensure_crl().await.unwrap();

    let addr = serve(create_router(AppState::new(ra))).await;
    TestServer {
        _dir: dir,
        artifacts,
        base_url: format!("http://{addr}"),
    }
}

fn checkout() -> ServiceId {
    ServiceId::parse("checkout").unwrap()
}

#[tokio::test]
async fn test_register_issue_once() {
    let server = start_ra().await;
    let client = RaClient::new(&server.base_url);

    assert!(client.health().await.unwrap());

    let reg = client.register(&checkout()).await.unwrap();
    assert_eq!(reg.spiffe_id, "spiffe://demo/ns/default/sa/checkout");

    let issued = client.issue(&reg.bootstrap_token).await.unwrap();
    let identity = extract_identity_from_pem(&issued.cert_pem).unwrap();
    assert_eq!(identity.spiffe_id, reg.spiffe_id);
    assert_eq!(identity.serial().unwrap(), issued.serial);

    let again = client.issue(&reg.bootstrap_token).await.unwrap_err();
    assert_eq!(again.status(), Some(401));

    let status = client.status().await.unwrap();
    assert_eq!(status.certs.len(), 1);
    assert_eq!(status.certs[0].serial, issued.serial);
    assert!(status.revoked.is_empty());
}

#[tokio::test]
async fn test_issue_token_query_fallback() {
    let server = start_ra().await;
    let client = RaClient::new(&server.base_url);
    let reg = client.register(&checkout()).await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/v1/issue", server.base_url))
        .query(&[("token", reg.bootstrap_token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Missing token entirely
    let response = reqwest::Client::new()
        .post(format!("{}/v1/issue", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_validation_errors() {
    let server = start_ra().await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/v1/register", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.contains("service"));

    let response = http
        .post(format!("{}/v1/revoke", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = http
        .post(format!("{}/v1/revoke", server.base_url))
        .query(&[("service", "checkout"), ("reason", "bogus")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_revoke_publishes_crl() {
    let server = start_ra().await;
    let client = RaClient::new(&server.base_url);

    let mut serials = Vec::new();
    for service in ["checkout", "checkout", "payments"] {
        let service = ServiceId::parse(service).unwrap();
        let reg = client.register(&service).await.unwrap();
        serials.push(client.issue(&reg.bootstrap_token).await.unwrap().serial);
    }

    let revoked = client
        .revoke_service(&checkout(), RevocationReason::KeyCompromise)
        .await
        .unwrap();
    assert_eq!(revoked.revoked.len(), 2);

    let status = client.status().await.unwrap();
    assert_eq!(status.certs.len(), 1);
    assert_eq!(status.certs[0].serial, serials[2]);
    assert_eq!(status.revoked.len(), 2);

    // Serve the CRL the way the publisher binary does
    let crl_addr = serve(create_crl_router(server.artifacts.crl_path())).await;
    let response = reqwest::get(format!("http://{crl_addr}/crl")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        PKIX_CRL_CONTENT_TYPE
    );
    let der = response.bytes().await.unwrap();
    let crl = parse_crl_der(&der).unwrap();
    assert!(crl.contains(&serials[0]));
    assert!(crl.contains(&serials[1]));
    assert!(!crl.contains(&serials[2]));
}

#[tokio::test]
async fn test_crl_publisher_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let addr = serve(create_crl_router(dir.path().join("crl.pem"))).await;

    let response = reqwest::get(format!("http://{addr}/crl")).await.unwrap();
    assert_eq!(response.status(), 404);

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_internal_errors_are_redacted() {
    let server = start_ra().await;
    let client = RaClient::new(&server.base_url);
    let reg = client.register(&checkout()).await.unwrap();

    std::fs::remove_file(server.artifacts.key_path(INTERMEDIATE)).unwrap();

    match client.issue(&reg.bootstrap_token).await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal error");
            let ca_dir = server.artifacts.base_dir().to_string_lossy().to_string();
            assert!(!message.contains(&ca_dir));
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = start_ra().await;
    let client = RaClient::new(&server.base_url);
    client.register(&checkout()).await.unwrap();

    let body = reqwest::get(format!("{}/metrics", server.base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("ztid_identities_registered 1"));
}
