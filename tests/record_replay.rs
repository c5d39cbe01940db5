//! Record-replay round-trip integration test.
//!
//! Records a deep scan against a mocked GitHub host, then replays the
//! written cassettes through `ServiceContext::replaying` and checks the
//! replayed scan matches the recorded one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use revive::adapters::live::GitHubClient;
use revive::adapters::recording::RecordingRepository;
use revive::cassette::ports;
use revive::cassette::session::RecordingSession;
use revive::config::Timings;
use revive::context::ServiceContext;
use revive::ports::RepoRef;
use revive::scan::deep_scan;

const APP: &str =
    "from flask import Flask\napp = Flask(__name__)\n@app.route('/items')\ndef items(): pass\n";

async fn mock_github() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/legacy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"default_branch": "main"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/legacy/git/trees/main"))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tree": [
                {"path": "app.py", "type": "blob", "size": APP.len(), "sha": "a1"},
                {"path": "logo.png", "type": "blob", "size": 2048, "sha": "b2"},
                {"path": "templates", "type": "tree", "sha": "c3"}
            ],
            "truncated": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/legacy/contents/app.py"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": STANDARD.encode(APP), "encoding": "base64"
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn recorded_scan_replays_identically() {
    let server = mock_github().await;
    let root = tempfile::tempdir().unwrap();
    let repo = RepoRef::parse("https://github.com/acme/legacy").unwrap();
    let timings = Timings::immediate();

    // --- Phase 1: record against the mocked host ---
    let session = RecordingSession::new(root.path()).unwrap();
    let live = GitHubClient::new(server.uri(), format!("{}/raw", server.uri()), None);
    let recording = RecordingRepository::new(Box::new(live), session.recorder(ports::REPO));
    let recorded = deep_scan(&recording, &repo, &timings).await.unwrap();
    drop(recording);
    let dir = session.finish().unwrap();
    assert!(dir.join("repo.cassette.yaml").is_file());
    assert!(!dir.join("llm.cassette.yaml").exists(), "unused ports write no cassette");

    assert_eq!(recorded.paths(), vec!["app.py"]);
    assert_eq!(recorded.profile.backend.framework.as_deref(), Some("Flask"));

    // --- Phase 2: replay, twice, without the host ---
    drop(server);
    for _ in 0..2 {
        let ctx = ServiceContext::replaying(&dir).unwrap();
        let replayed = deep_scan(ctx.repo.as_ref(), &repo, &timings).await.unwrap();
        assert_eq!(replayed, recorded, "replayed scan differs from recording");
    }
}

#[tokio::test]
async fn exhausted_cassette_surfaces_as_scan_error() {
    let root = tempfile::tempdir().unwrap();
    let session = RecordingSession::new(root.path()).unwrap();
    let dir = session.finish().unwrap();

    let ctx = ServiceContext::replaying(&dir).unwrap();
    let repo = RepoRef::parse("https://github.com/acme/legacy").unwrap();
    let err = deep_scan(ctx.repo.as_ref(), &repo, &Timings::immediate()).await.unwrap_err();
    assert!(err.contains("no cassette recorded for the repo port"), "{err}");
}
