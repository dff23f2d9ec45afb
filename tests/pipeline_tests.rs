/// End-to-end tests: scripted log source or saved export in, review file out
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use tempfile::TempDir;
use travel_audit_tools::authlog::types::{AuthLogPage, ContinuationToken, LogQuery};
use travel_audit_tools::commands::{analyze, detect};
use travel_audit_tools::config::{DetectionConfig, PairingStrategy};
use travel_audit_tools::detection::{AuthLogSource, RunContext};
use travel_audit_tools::error::AuditError;
use travel_audit_tools::utils::time::{parse_timestamp, LookbackWindow};

struct PagedSource {
    pages: VecDeque<anyhow::Result<AuthLogPage>>,
}

impl PagedSource {
    /// Split `records` into pages of `per_page`, chaining tokens between them.
    fn new(records: Vec<Value>, per_page: usize) -> Self {
        let chunks: Vec<Vec<Value>> = records.chunks(per_page).map(|c| c.to_vec()).collect();
        let last = chunks.len().saturating_sub(1);
        let pages = chunks
            .into_iter()
            .enumerate()
            .map(|(i, events)| {
                Ok(AuthLogPage {
                    events,
                    next_token: (i < last).then(|| ContinuationToken(vec![format!("page-{}", i + 1)])),
                })
            })
            .collect();
        Self { pages }
    }

    fn failing_after(records: Vec<Value>) -> Self {
        let mut source = Self::new(records, usize::MAX);
        if let Some(Ok(first)) = source.pages.front_mut() {
            first.next_token = Some(ContinuationToken(vec!["more".to_string()]));
        }
        source
            .pages
            .push_back(Err(anyhow::anyhow!("connection reset by peer")));
        source
    }
}

#[async_trait]
impl AuthLogSource for PagedSource {
    async fn fetch_page(
        &mut self,
        _query: &LogQuery,
        _token: Option<&ContinuationToken>,
    ) -> anyhow::Result<AuthLogPage> {
        self.pages
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("unexpected extra page request")))
    }
}

fn authlog(user: &str, iso: &str, state: Option<&str>) -> Value {
    json!({
        "user": {"name": user, "key": format!("DU-{}", user)},
        "isotimestamp": iso,
        "access_device": {"ip": "192.0.2.10", "location": {"state": state, "country": "United States"}},
        "factor": "duo_push",
        "result": "success",
        "txid": format!("{}-{}", user, iso),
    })
}

fn example_records() -> Vec<Value> {
    vec![
        authlog("U1", "2025-10-07T12:00:00+00:00", Some("CA")),
        authlog("U1", "2025-10-07T12:30:00+00:00", Some("NY")),
        authlog("U1", "2025-10-07T09:00:00+00:00", Some("CA")),
        authlog("U1", "2025-10-07T08:50:00+00:00", Some("CA")),
        authlog("U2", "2025-10-07T07:00:00+00:00", Some("TX")),
        authlog("U2", "2025-10-07T07:10:00+00:00", Some("TX")),
        authlog("U3", "2025-10-07T06:00:00+00:00", None),
        authlog("fimsusr", "2025-10-07T05:00:00+00:00", Some("CA")),
        authlog("fimsusr", "2025-10-07T05:01:00+00:00", Some("WA")),
    ]
}

fn window() -> LookbackWindow {
    LookbackWindow::ending_at(parse_timestamp("2025-10-08T00:00:00Z").unwrap(), 1).unwrap()
}

fn read_csv(path: &std::path::Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

#[tokio::test]
async fn test_detect_writes_review_file_for_example_scenario() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("review").join("impossible_travel.csv");
    let flags_path = dir.path().join("flags.json");

    let mut source = PagedSource::new(example_records(), 2);
    let outcome = detect::execute(
        &mut source,
        &window(),
        &DetectionConfig::default(),
        output.to_str().unwrap(),
        Some(flags_path.to_str().unwrap()),
        &RunContext::quiet(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.flagged_users(), ["U1"]);

    let (headers, rows) = read_csv(&output);
    assert_eq!(&headers[..3], ["user_id", "event_time", "location"]);
    assert!(headers.contains(&"access_device.ip".to_string()));
    assert!(headers.contains(&"txid".to_string()));
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r[0] == "U1"));

    let flags: Value = serde_json::from_str(&fs::read_to_string(&flags_path).unwrap()).unwrap();
    assert_eq!(flags["flagged_users"][0]["user_id"], "U1");
    assert_eq!(flags["flagged_users"][0]["hits"], 1);
    assert_eq!(flags["flags"][0]["gap_seconds"], 1800.0);
}

#[tokio::test]
async fn test_fetch_failure_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("impossible_travel.csv");

    let mut source = PagedSource::failing_after(example_records());
    let err = detect::execute(
        &mut source,
        &window(),
        &DetectionConfig::default(),
        output.to_str().unwrap(),
        None,
        &RunContext::quiet(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AuditError>(),
        Some(AuditError::Fetch { page: 2, .. })
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_no_multi_location_users_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("impossible_travel.csv");

    let records = vec![
        authlog("U2", "2025-10-07T07:00:00+00:00", Some("TX")),
        authlog("U2", "2025-10-07T07:10:00+00:00", Some("TX")),
    ];
    let mut source = PagedSource::new(records, 10);
    let err = detect::execute(
        &mut source,
        &window(),
        &DetectionConfig::default(),
        output.to_str().unwrap(),
        None,
        &RunContext::quiet(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AuditError>(),
        Some(AuditError::NoMultiLocationUsers)
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_multi_location_user_without_flag_is_still_written() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("impossible_travel.csv");

    let records = vec![
        authlog("U4", "2025-10-07T20:00:00+00:00", Some("CA")),
        authlog("U4", "2025-10-07T08:00:00+00:00", Some("NY")),
    ];
    let mut source = PagedSource::new(records, 10);
    let outcome = detect::execute(
        &mut source,
        &window(),
        &DetectionConfig::default(),
        output.to_str().unwrap(),
        None,
        &RunContext::quiet(),
    )
    .await
    .unwrap();

    assert!(outcome.flags.is_empty());
    let (_, rows) = read_csv(&output);
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_analyze_replays_ndjson_export() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("authlogs.ndjson");
    let output = dir.path().join("review.csv");

    let mut file = fs::File::create(&log_path).unwrap();
    for record in example_records() {
        writeln!(file, "{}", record).unwrap();
    }
    file.flush().unwrap();

    let outcome = analyze::run(
        &[log_path.to_str().unwrap().to_string()],
        &DetectionConfig::default(),
        output.to_str().unwrap(),
        None,
    )
    .unwrap();

    assert_eq!(outcome.flagged_users(), ["U1"]);
    assert_eq!(outcome.normalize_stats.missing_location, 1);
    assert_eq!(outcome.normalize_stats.excluded_accounts, 2);
    let (_, rows) = read_csv(&output);
    assert_eq!(rows.len(), 4);
}

#[test]
fn test_analyze_sliding_pairs_catches_boundary_change() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("authlogs.json");
    let output = dir.path().join("review.csv");

    // Most recent first: 12:00 A, 03:00 B, 02:00 A. The fast B -> A change
    // sits between the 2nd and 3rd login.
    let records = json!([
        authlog("U5", "2025-10-07T12:00:00+00:00", Some("A")),
        authlog("U5", "2025-10-07T03:00:00+00:00", Some("B")),
        authlog("U5", "2025-10-07T02:00:00+00:00", Some("A")),
    ]);
    fs::write(&log_path, records.to_string()).unwrap();
    let files = [log_path.to_str().unwrap().to_string()];

    let disjoint = analyze::run(&files, &DetectionConfig::default(), output.to_str().unwrap(), None)
        .unwrap();
    assert!(disjoint.flags.is_empty());

    let sliding_config = DetectionConfig {
        pairing: PairingStrategy::Sliding,
        ..DetectionConfig::default()
    };
    let sliding = analyze::run(&files, &sliding_config, output.to_str().unwrap(), None).unwrap();
    assert_eq!(sliding.flagged_users(), ["U5"]);
}

#[test]
fn test_analyze_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("review.csv");

    let result = analyze::run(
        &["/nonexistent/authlogs.json".to_string()],
        &DetectionConfig::default(),
        output.to_str().unwrap(),
        None,
    );
    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn test_unwritable_flag_export_leaves_no_review_file() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("authlogs.json");
    fs::write(&log_path, Value::Array(example_records()).to_string()).unwrap();
    let output = dir.path().join("review.csv");

    // A regular file where the export's directory would have to be created.
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "").unwrap();
    let flags_path = blocker.join("flags.json");

    let err = analyze::run(
        &[log_path.to_str().unwrap().to_string()],
        &DetectionConfig::default(),
        output.to_str().unwrap(),
        Some(flags_path.to_str().unwrap()),
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AuditError>(),
        Some(AuditError::Sink { .. })
    ));
    assert!(!output.exists());
    assert!(!flags_path.exists());
}

#[test]
fn test_flag_export_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("authlogs.json");
    fs::write(&log_path, Value::Array(example_records()).to_string()).unwrap();
    let output = dir.path().join("review.csv");
    let flags_path = dir.path().join("exports").join("2025-10-07").join("flags.json");

    analyze::run(
        &[log_path.to_str().unwrap().to_string()],
        &DetectionConfig::default(),
        output.to_str().unwrap(),
        Some(flags_path.to_str().unwrap()),
    )
    .unwrap();

    assert!(output.exists());
    assert!(flags_path.exists());
}

#[test]
fn test_analyze_rejects_out_of_range_lookback() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("review.csv");
    let config = DetectionConfig {
        days_to_go_back: u32::MAX,
        ..DetectionConfig::default()
    };

    let err = analyze::run(
        &["/nonexistent/authlogs.json".to_string()],
        &config,
        output.to_str().unwrap(),
        None,
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AuditError>(),
        Some(AuditError::Config(_))
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_detect_rejects_out_of_range_lookback_before_credentials() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("review.csv");
    let config = DetectionConfig {
        days_to_go_back: u32::MAX,
        ..DetectionConfig::default()
    };

    let err = detect::run(
        detect::Credentials::default(),
        &config,
        output.to_str().unwrap(),
        None,
        false,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AuditError>(),
        Some(AuditError::Config(_))
    ));
    assert!(!output.exists());
}
