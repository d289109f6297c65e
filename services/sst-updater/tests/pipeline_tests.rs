//! End-to-end runs against a scripted griddap transport.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sst_common::{parse_iso, DataSource, HttpConfig, PipelineConfig, ResolutionClass};
use sst_updater::{
    ErddapClient, HttpResponse, HttpTransport, Pipeline, RunOptions, RunSummary, TimeSelector, TransportError,
};
use storage::artifact::FeatureCollection;
use storage::{ArtifactMeta, Manifest};
use tempfile::TempDir;
use test_utils::fixtures::{composite_source, nodes, regions, test_source, time};
use test_utils::{axis, celsius_grid, grid_table_json, info_json, time_axis_json};

type Responder = dyn Fn(&str) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Transport that answers from a closure and records every URL.
struct MockTransport {
    requests: Mutex<Vec<String>>,
    responder: Box<Responder>,
}

impl MockTransport {
    fn new(responder: impl Fn(&str) -> Result<HttpResponse, TransportError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn grid_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|url| url.contains("json?sea_surface_temperature[") || url.contains("json?sst["))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        (self.responder)(url)
    }
}

const VAR: &str = "sea_surface_temperature";

fn lat() -> Vec<f64> {
    axis(24.0, 1.0, 2)
}

fn lon() -> Vec<f64> {
    axis(-98.0, 1.0, 3)
}

fn grid_body(values: &[f64]) -> HttpResponse {
    HttpResponse::ok(grid_table_json(VAR, "degree_C", "2024-06-02T12:00:00Z", &lat(), &lon(), values))
}

/// A mirror that answers every query.
fn healthy(url: &str, axis_times: &[&str]) -> Result<HttpResponse, TransportError> {
    if url.ends_with(".json?time") {
        Ok(HttpResponse::ok(time_axis_json(axis_times)))
    } else if url.contains("/info/") {
        Ok(HttpResponse::ok(info_json(&[(VAR, Some("degree_C"))])))
    } else {
        Ok(grid_body(&celsius_grid(3, 2)))
    }
}

fn is_grid(url: &str) -> bool {
    url.contains(&format!("json?{}[", VAR))
}

fn config(dir: &Path, sources: Vec<DataSource>) -> PipelineConfig {
    PipelineConfig {
        output_dir: dir.to_path_buf(),
        region: regions::small(),
        sources,
        http: HttpConfig {
            max_retries: 2,
            initial_retry_delay_ms: 1,
            max_retry_delay_ms: 2,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn now() -> DateTime<Utc> {
    parse_iso(time::NOW).unwrap()
}

fn explicit(ts: &str) -> RunOptions {
    RunOptions {
        selector: Some(TimeSelector::Explicit(parse_iso(ts).unwrap())),
        ..Default::default()
    }
}

async fn run(mock: &Arc<MockTransport>, config: PipelineConfig, options: RunOptions) -> RunSummary {
    let transport: Arc<dyn HttpTransport> = mock.clone();
    let client = ErddapClient::new(transport, &config.http);
    Pipeline::new(config, client, options).run(now()).await.unwrap()
}

fn blended() -> DataSource {
    test_source("blended", ResolutionClass::Blended)
}

#[tokio::test]
async fn test_first_healthy_mirror_wins() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new(|url| {
        if is_grid(url) && url.starts_with(nodes::PRIMARY) {
            Ok(HttpResponse::status(500))
        } else if is_grid(url) && url.starts_with(nodes::SECONDARY) {
            Ok(HttpResponse::status(404))
        } else {
            healthy(url, &time::DAILY)
        }
    });

    let summary = run(&mock, config(dir.path(), vec![blended()]), explicit(time::DAILY[2])).await;

    assert_eq!(summary.written, 1);
    assert!(summary.failures.is_empty());

    let grids = mock.grid_requests();
    assert_eq!(grids.len(), 3);
    assert!(grids[0].starts_with(nodes::PRIMARY));
    assert!(grids[1].starts_with(nodes::SECONDARY));
    assert!(grids[2].starts_with(nodes::TERTIARY));
    assert!(grids[2].ends_with("[(2024-06-02T12:00:00Z)][(24):(26)][(-98):(-95)]"));

    assert!(dir.path().join("sst_blended_20240602.json").is_file());
    assert!(dir.path().join("sst_blended_20240602.json.meta.json").is_file());
}

#[tokio::test]
async fn test_cached_rerun_issues_no_requests() {
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("sst_blended_20240602.json");

    let first = MockTransport::new(|url| healthy(url, &time::DAILY));
    let summary = run(&first, config(dir.path(), vec![blended()]), explicit(time::DAILY[2])).await;
    assert_eq!(summary.written, 1);
    let original = std::fs::read(&artifact).unwrap();

    let second = MockTransport::new(|url| healthy(url, &time::DAILY));
    let summary = run(&second, config(dir.path(), vec![blended()]), explicit(time::DAILY[2])).await;

    assert!(second.requests().is_empty());
    assert_eq!(summary.written, 0);
    assert_eq!(summary.cached, 1);
    assert!(!summary.is_hard_failure());
    assert_eq!(std::fs::read(&artifact).unwrap(), original);
}

#[tokio::test]
async fn test_cached_window_only_queries_time_axis() {
    let dir = TempDir::new().unwrap();

    let first = MockTransport::new(|url| healthy(url, &time::DAILY));
    let summary = run(&first, config(dir.path(), vec![blended()]), RunOptions::default()).await;
    assert_eq!(summary.written, 3);

    let second = MockTransport::new(|url| healthy(url, &time::DAILY));
    let summary = run(&second, config(dir.path(), vec![blended()]), RunOptions::default()).await;

    assert_eq!(summary.cached, 3);
    assert_eq!(
        second.requests(),
        vec![format!("{}/griddap/blended.json?time", nodes::PRIMARY)]
    );
}

#[tokio::test]
async fn test_force_refetches() {
    let dir = TempDir::new().unwrap();

    let first = MockTransport::new(|url| healthy(url, &time::DAILY));
    run(&first, config(dir.path(), vec![blended()]), explicit(time::DAILY[2])).await;

    let second = MockTransport::new(|url| healthy(url, &time::DAILY));
    let options = RunOptions {
        force: true,
        ..explicit(time::DAILY[2])
    };
    let summary = run(&second, config(dir.path(), vec![blended()]), options).await;

    assert_eq!(summary.written, 1);
    assert_eq!(second.grid_requests().len(), 1);
}

#[tokio::test]
async fn test_transient_failures_are_retried_then_escalated() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new(|url| {
        if is_grid(url) && url.starts_with(nodes::PRIMARY) {
            Err(TransportError::Timeout("read timed out".to_string()))
        } else {
            healthy(url, &time::DAILY)
        }
    });

    let summary = run(&mock, config(dir.path(), vec![blended()]), explicit(time::DAILY[0])).await;
    assert_eq!(summary.written, 1);

    let grids = mock.grid_requests();
    let primary = grids.iter().filter(|u| u.starts_with(nodes::PRIMARY)).count();
    assert_eq!(primary, 3, "one attempt plus two retries");
    assert_eq!(grids.len(), 4);
    assert!(grids[3].starts_with(nodes::SECONDARY));
}

#[tokio::test]
async fn test_variable_and_units_from_metadata() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new(|url| {
        if url.contains("/info/") {
            Ok(HttpResponse::ok(info_json(&[("sst", Some("K"))])))
        } else {
            let values = vec![300.0; 6];
            Ok(HttpResponse::ok(grid_table_json(
                "sst",
                "K",
                "2024-06-01T12:00:00Z",
                &lat(),
                &lon(),
                &values,
            )))
        }
    });

    let summary = run(&mock, config(dir.path(), vec![blended()]), explicit(time::DAILY[1])).await;
    assert_eq!(summary.written, 1);
    assert!(mock.grid_requests()[0].contains("json?sst[("));

    let bytes = std::fs::read(dir.path().join("sst_blended_20240601.json")).unwrap();
    let points: FeatureCollection = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(points.features.len(), 6);
    assert!(points.features.iter().all(|f| f.properties.t == 80.3));
}

#[tokio::test]
async fn test_fully_masked_grid_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new(|url| {
        if is_grid(url) {
            // 60 °C is far outside the plausible band
            Ok(grid_body(&[60.0; 6]))
        } else {
            healthy(url, &time::DAILY)
        }
    });

    let summary = run(&mock, config(dir.path(), vec![blended()]), explicit(time::DAILY[2])).await;

    assert_eq!(summary.written, 0);
    assert_eq!(summary.empty, 1);
    assert!(summary.failures.is_empty());
    assert_eq!(mock.grid_requests().len(), 1);
    assert!(!dir.path().join("sst_blended_20240602.json").exists());
    assert!(!dir.path().join("sst_blended_20240602.json.meta.json").exists());
}

#[tokio::test]
async fn test_failed_source_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new(|url| {
        if url.contains("/broken") {
            Ok(HttpResponse::status(404))
        } else {
            healthy(url, &time::DAILY)
        }
    });
    let sources = vec![test_source("broken", ResolutionClass::NearRealTime), blended()];

    let summary = run(&mock, config(dir.path(), sources), RunOptions::default()).await;

    assert_eq!(summary.written, 3);
    assert_eq!(summary.sources_with_data, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].source_id, "broken");
    assert_eq!(summary.failures[0].kind, "all_sources_exhausted");
    assert!(!summary.is_hard_failure());

    // Every mirror was asked for the broken source's time axis
    let broken = mock.requests().into_iter().filter(|u| u.contains("/broken")).count();
    assert_eq!(broken, 3);
}

#[tokio::test]
async fn test_nothing_available_is_hard_failure() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new(|_| Ok(HttpResponse::status(503)));

    let summary = run(&mock, config(dir.path(), vec![blended()]), RunOptions::default()).await;

    assert!(summary.is_hard_failure());
    assert_eq!(summary.manifest_entries, 0);
    assert!(dir.path().join("manifest.json").is_file());
}

#[tokio::test]
async fn test_composite_fills_gaps_across_passes() {
    let dir = TempDir::new().unwrap();
    let nan = f64::NAN;
    let mock = MockTransport::new(move |url| {
        if !is_grid(url) {
            return healthy(url, &time::HOURLY);
        }
        let values = if url.contains("T21:00:00Z") {
            vec![26.0, nan, 26.0, 26.0, 26.0, 26.0]
        } else {
            vec![nan, 25.0, 25.0, 25.0, nan, 25.0]
        };
        Ok(grid_body(&values))
    });

    let summary = run(&mock, config(dir.path(), vec![composite_source("hourly")]), RunOptions::default()).await;
    assert_eq!(summary.written, 1);
    assert_eq!(mock.grid_requests().len(), 3);

    let artifact = dir.path().join("sst_hourly_20240602T220000_mean.json");
    let points: FeatureCollection = serde_json::from_slice(&std::fs::read(artifact).unwrap()).unwrap();
    assert_eq!(points.features.len(), 6, "every cell observed at least once");

    let meta: ArtifactMeta = serde_json::from_slice(
        &std::fs::read(dir.path().join("sst_hourly_20240602T220000_mean.json.meta.json")).unwrap(),
    )
    .unwrap();
    assert!(meta.composite);
    assert_eq!(meta.members, 3);
    assert_eq!(meta.timestamp, parse_iso(time::HOURLY[2]).unwrap());
}

#[tokio::test]
async fn test_manifest_lists_written_artifacts() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new(|url| healthy(url, &time::DAILY));

    let summary = run(&mock, config(dir.path(), vec![blended()]), RunOptions::default()).await;
    assert_eq!(summary.manifest_entries, 3);
    assert!(summary.manifest_current);

    let manifest = Manifest::load(&dir.path().join("manifest.json")).unwrap();
    assert_eq!(manifest.latest.as_deref(), Some("2024-06-02"));
    let day = &manifest.dates["2024-06-02"];
    assert_eq!(day.best, "sst_blended_20240602.json");
    assert_eq!(day.entries[0].source_id, "blended");
}

#[tokio::test]
async fn test_skip_manifest_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new(|url| healthy(url, &time::DAILY));
    let options = RunOptions {
        skip_manifest: true,
        ..explicit(time::DAILY[2])
    };

    let summary = run(&mock, config(dir.path(), vec![blended()]), options).await;

    assert_eq!(summary.written, 1);
    assert_eq!(summary.manifest_entries, 1);
    assert!(!dir.path().join("manifest.json").exists());
}

#[test]
fn test_sample_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/sst.yaml");
    let config = PipelineConfig::load(&path).unwrap();

    let registry = config.registry();
    assert_eq!(registry.len(), 3);
    assert!(registry.get("noaacwg19sstHourly").unwrap().composite);
    assert_eq!(config.lookback.hours, 72);
}
