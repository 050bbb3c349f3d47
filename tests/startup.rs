//! End-to-end checks of the `gridwatch` binary against a loopback portal.

use std::process::Output;

use gridwatch_odp::mock::{MockResponse, MockServer};
use tokio::process::Command;

const SCENARIO: &str = r#"[{"id":1,"ts":"2024-01-01T00:00:00Z","type":"thermal","value":12.5}]"#;

async fn gridwatch(
    dir: &tempfile::TempDir,
    endpoint: &str,
    key: Option<&str>,
    args: &[&str],
) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gridwatch"));
    command
        .args(args)
        .current_dir(dir.path())
        .env("GRIDWATCH_ENDPOINT", endpoint)
        .env("GRIDWATCH_RETRY_BACKOFF", "10ms")
        .env_remove("ODP_API_KEY");
    if let Some(key) = key {
        command.env("ODP_API_KEY", key);
    }
    command.output().await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_api_key_exits_before_fetching() {
    let server = MockServer::start(vec![MockResponse::ok(SCENARIO)]).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let output = gridwatch(&dir, &server.url(), None, &[]).await;

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ODP_API_KEY"));
    assert_eq!(server.request_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blank_api_key_is_missing() {
    let server = MockServer::start(vec![MockResponse::ok(SCENARIO)]).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let output = gridwatch(&dir, &server.url(), Some("  "), &["--once"]).await;

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(server.request_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_once_prints_scenario_record() {
    let server = MockServer::start(vec![MockResponse::ok(SCENARIO)]).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let args = ["--once", "--no-record"];
    let output = gridwatch(&dir, &server.url(), Some("abc123"), &args).await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("thermal, 12.5"));
    assert!(stdout.contains("2024-01-01 00:00:00"));
    assert_eq!(server.request_count(), 1);
    assert!(!dir.path().join("data").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_once_records_csv() {
    let server = MockServer::start(vec![MockResponse::ok(SCENARIO)]).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let output = gridwatch(&dir, &server.url(), Some("abc123"), &["--once"]).await;
    assert!(output.status.success());

    let csv_path = dir.path().join("data/output/constraint_monitoring.csv");
    let csv = std::fs::read_to_string(csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("timestamp,constraint_id"));
    assert!(lines[1].contains("thermal"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_key_is_fatal() {
    let server = MockServer::start(vec![MockResponse::status(401)]).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let output = gridwatch(&dir, &server.url(), Some("wrong"), &["--once"]).await;

    assert_eq!(output.status.code(), Some(1));
    // Authentication failures are not retried
    assert_eq!(server.request_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_export_writes_json() {
    let server = MockServer::start(vec![MockResponse::ok(SCENARIO)]).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let output = gridwatch(
        &dir,
        &server.url(),
        Some("abc123"),
        &["--export", "out.json", "--no-record"],
    )
    .await;
    assert!(output.status.success());

    let exported = std::fs::read_to_string(dir.path().join("out.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&exported).unwrap();
    assert_eq!(json["summary"]["total_records"], 1);
    assert_eq!(json["records"][0]["label"], "thermal, 12.5");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_der_flag_is_trimmed() {
    let server = MockServer::start(vec![MockResponse::ok(SCENARIO)]).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let args = ["--once", "--no-record", "--der", "  Wissington "];
    let output = gridwatch(&dir, &server.url(), Some("abc123"), &args).await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(server.requests()[0].ends_with("refine=der_name%3AWissington"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blank_der_flag_means_no_filter() {
    let server = MockServer::start(vec![MockResponse::ok(SCENARIO)]).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let args = ["--once", "--no-record", "--der", "   "];
    let output = gridwatch(&dir, &server.url(), Some("abc123"), &args).await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(!server.requests()[0].contains("refine"));
}
