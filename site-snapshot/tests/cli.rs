use assert_cmd::Command;
use std::time::Duration;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SETTINGS_PATH: &str = "/elasticsearch_index_db_default/_settings";
const CLONE_PATH: &str = "/elasticsearch_index_db_default/_clone/elasticsearch_index_20240101";

/// The binary with a clean environment: no inherited Elasticsearch settings.
fn site_snapshot() -> Command {
    let mut cmd = Command::cargo_bin("site-snapshot").expect("Binary exists");
    for var in [
        "ELASTICSEARCH_URL",
        "ELASTICSEARCH_USERNAME",
        "ELASTICSEARCH_PASSWORD",
        "ELASTICSEARCH_INDEX",
        "ELASTICSEARCH_INDEX_PREFIX",
        "SNAPSHOT_ID",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

async fn mount_write_block(server: &MockServer, blocked: bool, status: u16) {
    Mock::given(method("PUT"))
        .and(path(SETTINGS_PATH))
        .and(body_json(json!({ "settings": { "index.blocks.write": blocked } })))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn es_snapshot_happy_flow_exits_zero() {
    let server = MockServer::start().await;
    mount_write_block(&server, true, 200).await;
    Mock::given(method("POST"))
        .and(path(CLONE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;
    mount_write_block(&server, false, 200).await;

    site_snapshot()
        .arg("es-snapshot")
        .arg("--url")
        .arg(server.uri())
        .arg("--id")
        .arg("20240101")
        .assert()
        .success()
        .stdout(predicate::str::contains("Snapshot complete: elasticsearch_index_20240101"));
}

#[tokio::test(flavor = "multi_thread")]
async fn es_snapshot_clone_conflict_exits_with_clone_code() {
    let server = MockServer::start().await;
    mount_write_block(&server, true, 200).await;
    Mock::given(method("POST"))
        .and(path(CLONE_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"error":{"type":"resource_already_exists_exception"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_write_block(&server, false, 200).await;

    site_snapshot()
        .args(["es-snapshot", "--id", "20240101", "--url"])
        .arg(server.uri())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("resource_already_exists_exception"));
}

#[tokio::test(flavor = "multi_thread")]
async fn es_snapshot_unauthorized_freeze_exits_with_freeze_code() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(SETTINGS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    site_snapshot()
        .args(["es-snapshot", "--id", "20240101", "--url"])
        .arg(server.uri())
        .env("ELASTICSEARCH_USERNAME", "elastic")
        .env("ELASTICSEARCH_PASSWORD", "wrong")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("HTTP 401"));
}

#[test]
fn es_snapshot_requires_url() {
    site_snapshot()
        .arg("es-snapshot")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn es_snapshot_rejects_non_http_url() {
    site_snapshot()
        .args(["es-snapshot", "--url", "ftp://es.example"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("http(s)"));
}

#[test]
fn snapshot_create_missing_config_fails() {
    site_snapshot()
        .args(["snapshot-create", "--config", "does-not-exist.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn help_lists_subcommands() {
    site_snapshot()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("es-snapshot").and(predicate::str::contains("snapshot-create")));
}

async fn requests_received(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

/// SIGINT while the clone is in flight must not skip the unfreeze.
#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn es_snapshot_interrupted_after_freeze_still_unfreezes() {
    use assert_cmd::cargo::CommandCargoExt;
    use std::process::Stdio;

    let server = MockServer::start().await;
    mount_write_block(&server, true, 200).await;
    Mock::given(method("POST"))
        .and(path(CLONE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"acknowledged": true}))
                .set_delay(Duration::from_millis(1500)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_write_block(&server, false, 200).await;

    let mut child = std::process::Command::cargo_bin("site-snapshot")
        .expect("Binary exists")
        .args(["es-snapshot", "--id", "20240101", "--url"])
        .arg(server.uri())
        .env_remove("ELASTICSEARCH_USERNAME")
        .env_remove("ELASTICSEARCH_PASSWORD")
        .env_remove("SNAPSHOT_ID")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn site-snapshot");

    // Wait until the freeze has landed and the clone is being held.
    let mut waited = Duration::ZERO;
    while requests_received(&server).await < 2 {
        assert!(waited < Duration::from_secs(10), "clone request never arrived");
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    let kill = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("run kill");
    assert!(kill.success());

    let status = loop {
        if let Some(status) = child.try_wait().expect("poll child") {
            break status;
        }
        assert!(waited < Duration::from_secs(20), "site-snapshot did not exit");
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    };

    assert_eq!(status.code(), Some(0), "interrupted run must still finish cleanly");
    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 3);
    let unfreeze: serde_json::Value =
        serde_json::from_slice(&requests[2].body).expect("unfreeze body is JSON");
    assert_eq!(unfreeze, json!({ "settings": { "index.blocks.write": false } }));
}

#[tokio::test(flavor = "multi_thread")]
async fn es_snapshot_rejects_invalid_id_before_freezing() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    site_snapshot()
        .args(["es-snapshot", "--id", "Release/..", "--url"])
        .arg(server.uri())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid index name"));
}

#[test]
fn es_snapshot_rejects_zero_timeout() {
    site_snapshot()
        .args(["es-snapshot", "--url", "http://localhost:9200", "--timeout-secs", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--timeout-secs"));
}
