mod common;

use common::*;
use provider_harvest::adapters::sink::{OutputFormat, CSV_FILENAME, JSON_FILENAME, SUMMARY_FILENAME};
use provider_harvest::utils::error::ErrorSeverity;
use provider_harvest::{FileSink, HarvestEngine, LocalStorage, SearchOrchestrator, SearchRequest};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_engine_writes_records_and_summary() {
    let log = new_log();
    let api = ScriptedPlaces::new(log.clone())
        .with_pages(&query("dentists", "Pune"), &[&["p1", "p2", "p3"]])
        .with_pages(&query("dentists", "Nashik"), &[&["n1", "n2"]]);
    let orchestrator = SearchOrchestrator::new(api, test_settings())
        .with_pacer(pacer(&log, CancellationToken::new()));

    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_string_lossy().to_string();
    let sink = FileSink::new(LocalStorage::new(output_path.clone()), output_path.clone())
        .with_formats(vec![OutputFormat::Csv, OutputFormat::Json])
        .with_location_column(true);

    let request = SearchRequest::new("dentists", vec!["Pune".to_string(), "Nashik".to_string()])
        .with_per_location_cap(2)
        .with_location_tag(true);
    let report = tokio_test::assert_ok!(HarvestEngine::new(orchestrator, sink).run(&request).await);

    assert_eq!(report.output_location, output_path);
    assert_eq!(report.outcome.summary.total_records, 4);

    let csv = std::fs::read_to_string(temp_dir.path().join(CSV_FILENAME)).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().contains("source_location"));
    assert_eq!(lines.clone().count(), 4);
    assert!(lines.all(|line| line.contains("Pune") || line.contains("Nashik")));

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(temp_dir.path().join(JSON_FILENAME)).unwrap())
            .unwrap();
    assert_eq!(json.as_array().unwrap().len(), 4);

    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(temp_dir.path().join(SUMMARY_FILENAME)).unwrap())
            .unwrap();
    assert_eq!(summary["total_records"], 4);
    assert_eq!(summary["locations"][1]["location"], "Nashik");
    assert_eq!(summary["locations"][1]["status"], "completed");
}

#[tokio::test]
async fn test_engine_surfaces_rejected_credentials() {
    let log = new_log();
    let pune = query("dentists", "Pune");
    let api = ScriptedPlaces::new(log.clone()).failing_search(
        &pune,
        0,
        provider_harvest::ApiError::unauthorized("The provided API key is invalid."),
        usize::MAX,
    );
    let orchestrator = SearchOrchestrator::new(api, test_settings())
        .with_pacer(pacer(&log, CancellationToken::new()));

    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_string_lossy().to_string();
    let sink = FileSink::new(LocalStorage::new(output_path.clone()), output_path);

    let err = HarvestEngine::new(orchestrator, sink)
        .run(&SearchRequest::new("dentists", vec!["Pune".to_string()]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        provider_harvest::HarvestError::CredentialRejected { .. }
    ));
    assert!(!temp_dir.path().join(CSV_FILENAME).exists());
}

#[tokio::test]
async fn test_engine_reports_cancelled_run_with_nothing_collected() {
    let log = new_log();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let api = ScriptedPlaces::new(log.clone()).with_pages(&query("dentists", "Pune"), &[&["p1"]]);
    let orchestrator =
        SearchOrchestrator::new(api, test_settings()).with_pacer(pacer(&log, cancel));

    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_string_lossy().to_string();
    let sink = FileSink::new(LocalStorage::new(output_path.clone()), output_path);

    let err = HarvestEngine::new(orchestrator, sink)
        .run(&SearchRequest::new("dentists", vec!["Pune".to_string()]))
        .await
        .unwrap_err();

    assert!(matches!(err, provider_harvest::HarvestError::Cancelled));
    assert_eq!(err.severity(), ErrorSeverity::Low);
    assert!(!temp_dir.path().join(SUMMARY_FILENAME).exists());
}

#[tokio::test]
async fn test_engine_writes_partial_output_after_cancellation() {
    let log = new_log();
    let cancel = CancellationToken::new();
    let pune = query("dentists", "Pune");
    let api = ScriptedPlaces::new(log.clone())
        .with_pages(&pune, &[&["p1", "p2"], &["p3"]])
        .cancelling_on(&pune, 1, cancel.clone());
    let orchestrator =
        SearchOrchestrator::new(api, test_settings()).with_pacer(pacer(&log, cancel));

    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_string_lossy().to_string();
    let sink = FileSink::new(LocalStorage::new(output_path.clone()), output_path);

    let report = HarvestEngine::new(orchestrator, sink)
        .run(&SearchRequest::new("dentists", vec!["Pune".to_string()]))
        .await
        .unwrap();

    assert!(report.outcome.summary.cancelled);
    assert_eq!(report.outcome.records.len(), 2);
    let csv = std::fs::read_to_string(temp_dir.path().join(CSV_FILENAME)).unwrap();
    assert_eq!(csv.lines().count(), 3);
}
