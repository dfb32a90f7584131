//! Registry client over real HTTP.
//!
//! Runs [`RegistrationClient`] with the reqwest transport against a local
//! mock registry, and the install file fetcher against a mock mirror.

use mockito::{Matcher, Server};
use serde_json::json;

use cadvisor_charm::error::CharmError;
use cadvisor_charm::host::{Fetcher, HttpFetcher, UnitIdentity};
use cadvisor_charm::registration::{
    default_labels, DeregisterOutcome, HttpTransport, Labels, RegisterOutcome, RegistrationClient,
};

const TARGET_PATH: &str = "/targets/10.0.0.5:9103";

fn identity() -> UnitIdentity {
    UnitIdentity {
        hostname: "node-1".to_string(),
        unit_name: "cadvisor/0".to_string(),
        private_address: "10.0.0.5".to_string(),
        model_name: None,
        env_name: Some("lab".to_string()),
    }
}

fn client(server: &Server) -> RegistrationClient {
    RegistrationClient::new(Box::new(HttpTransport::new()), identity(), "cadvisor")
        .with_registry(Some(&format!("{}/", server.url())), "token-1\n")
}

#[test]
fn test_register_creates_missing_target() {
    let mut server = Server::new();
    let lookup = server
        .mock("GET", TARGET_PATH)
        .match_header("AuthToken", "token-1")
        .with_status(200)
        .with_body("null")
        .create();
    let create = server
        .mock("POST", TARGET_PATH)
        .match_header("AuthToken", "token-1")
        .match_body(Matcher::Json(json!({
            "comment": "Added by charm cadvisor",
            "labels": {
                "host": "node-1",
                "juju_unit": "cadvisor/0",
                "juju_env": "lab",
            },
        })))
        .with_status(201)
        .create();

    let outcome = client(&server).register(Some("10.0.0.5"), 9103, &Labels::new()).unwrap();

    assert_eq!(outcome, RegisterOutcome::Created);
    lookup.assert();
    create.assert();
}

#[test]
fn test_register_updates_changed_labels() {
    let mut server = Server::new();
    server
        .mock("GET", TARGET_PATH)
        .with_status(200)
        .with_body(json!([{ "labels": { "host": "old-node" } }]).to_string())
        .create();
    let update = server
        .mock("PUT", TARGET_PATH)
        .match_body(Matcher::PartialJson(json!({ "labels": { "team": "infra" } })))
        .with_status(200)
        .create();

    let mut custom = Labels::new();
    custom.insert("team".to_string(), "infra".to_string());
    let outcome = client(&server).register(Some("10.0.0.5"), 9103, &custom).unwrap();

    assert_eq!(outcome, RegisterOutcome::Updated);
    update.assert();
}

#[test]
fn test_register_is_noop_when_labels_match() {
    let mut server = Server::new();
    server
        .mock("GET", TARGET_PATH)
        .with_status(200)
        .with_body(json!([{ "labels": default_labels(&identity()) }]).to_string())
        .create();
    let writes = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create();
    let updates = server.mock("PUT", Matcher::Any).expect(0).create();

    let outcome = client(&server).register(Some("10.0.0.5"), 9103, &Labels::new()).unwrap();

    assert_eq!(outcome, RegisterOutcome::Unchanged);
    writes.assert();
    updates.assert();
}

#[test]
fn test_register_rejected_write_is_error() {
    let mut server = Server::new();
    server.mock("GET", TARGET_PATH).with_status(200).with_body("[]").create();
    server
        .mock("POST", TARGET_PATH)
        .with_status(403)
        .with_body("forbidden")
        .create();

    let err = client(&server)
        .register(Some("10.0.0.5"), 9103, &Labels::new())
        .unwrap_err();

    match err {
        CharmError::Registration { status, body, .. } => {
            assert_eq!(status, 403);
            assert_eq!(body, "forbidden");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_deregister_deletes_registered_target() {
    let mut server = Server::new();
    server
        .mock("GET", TARGET_PATH)
        .with_status(200)
        .with_body(json!([{ "labels": { "host": "node-1" } }]).to_string())
        .create();
    let delete = server
        .mock("DELETE", TARGET_PATH)
        .match_header("AuthToken", "token-1")
        .match_body(Matcher::Json(json!({ "comment": "Delete by charm cadvisor" })))
        .with_status(200)
        .create();

    let outcome = client(&server).deregister(Some("10.0.0.5"), 9103).unwrap();

    assert_eq!(outcome, DeregisterOutcome::Deleted);
    delete.assert();
}

#[test]
fn test_deregister_tolerates_concurrent_removal() {
    let mut server = Server::new();
    server
        .mock("GET", TARGET_PATH)
        .with_status(200)
        .with_body(json!([{ "labels": {} }]).to_string())
        .create();
    server
        .mock("DELETE", TARGET_PATH)
        .with_status(500)
        .with_body("Storage Error host not found unable to delete")
        .create();

    let outcome = client(&server).deregister(Some("10.0.0.5"), 9103).unwrap();
    assert_eq!(outcome, DeregisterOutcome::AlreadyDeleted);
}

#[test]
fn test_deregister_absent_target_sends_no_delete() {
    let mut server = Server::new();
    server.mock("GET", TARGET_PATH).with_status(200).with_body("null").create();
    let delete = server.mock("DELETE", Matcher::Any).expect(0).create();

    let outcome = client(&server).deregister(Some("10.0.0.5"), 9103).unwrap();

    assert_eq!(outcome, DeregisterOutcome::Absent);
    delete.assert();
}

#[test]
fn test_fetcher_downloads_file() {
    let mut server = Server::new();
    server
        .mock("GET", "/pool/cadvisor_0.44_amd64.deb")
        .with_status(200)
        .with_body("!<arch>\n")
        .create();

    let mut dest = Vec::new();
    let bytes = HttpFetcher::new()
        .fetch(&format!("{}/pool/cadvisor_0.44_amd64.deb", server.url()), None, &mut dest)
        .unwrap();

    assert_eq!(bytes, 8);
    assert_eq!(dest, b"!<arch>\n");
}

#[test]
fn test_fetcher_rejects_missing_file() {
    let mut server = Server::new();
    server.mock("GET", "/missing.deb").with_status(404).create();

    let mut dest = Vec::new();
    let err = HttpFetcher::new()
        .fetch(&format!("{}/missing.deb", server.url()), None, &mut dest)
        .unwrap_err();

    assert!(matches!(err, CharmError::Download { .. }));
    assert!(dest.is_empty());
}
