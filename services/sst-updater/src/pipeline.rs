//! One update run over every enabled source.
//!
//! ```text
//! for each source:
//!     discover timestamps (time axis via fallback chain, unless explicit)
//!     drop timestamps whose artifact is already on disk
//!     resolve variable + units (metadata via fallback chain, once)
//!     for each remaining timestamp (or once per window for composites):
//!         fetch grid (fallback chain) → normalize → [aggregate] → write
//! purge + rebuild manifest
//! ```
//!
//! Failures are isolated per (source, timestamp) and collected into a
//! [`RunSummary`]; only storage errors on the manifest stop the run.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use grid_processor::{aggregate_grids, GridNormalizer, NormalizedGrid};
use serde::Serialize;
use sst_common::{format_iso, DataSource, PipelineConfig, SourceRegistry};
use storage::{ArtifactKey, ArtifactWriter, ManifestBuilder, StorageError, WriteOutcome};
use tracing::{debug, info, instrument, warn};

use crate::client::{ErddapClient, GridQuery};
use crate::error::{FetchError, Result};
use crate::fallback::{FallbackChain, RetryPolicy};
use crate::selector::TimeSelector;

/// Per-run switches, usually from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overwrite artifacts that already exist.
    pub force: bool,
    /// Overrides the configured lookback.
    pub selector: Option<TimeSelector>,
    /// Leave the manifest file untouched.
    pub skip_manifest: bool,
}

/// A (source, timestamp) unit that produced nothing.
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub source_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: String,
    pub error: String,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub written: usize,
    pub cached: usize,
    /// Units skipped because every cell was masked.
    pub empty: usize,
    pub failures: Vec<UnitFailure>,
    /// Sources with at least one written or cached artifact this run.
    pub sources_with_data: usize,
    pub manifest_entries: usize,
    pub manifest_latest: Option<String>,
    /// Manifest lists a date inside the lookback window.
    pub manifest_current: bool,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Nothing new, nothing on hand and nothing recent to serve.
    pub fn is_hard_failure(&self) -> bool {
        self.written == 0 && self.sources_with_data == 0 && !self.manifest_current
    }

    fn record_failure(&mut self, source: &DataSource, timestamp: Option<DateTime<Utc>>, err: &FetchError) {
        metrics::counter!("sst_unit_failures_total", "kind" => err.kind()).increment(1);
        warn!(
            source = %source.id,
            timestamp = ?timestamp.map(|ts| format_iso(&ts)),
            kind = err.kind(),
            error = %err,
            "Unit of work failed"
        );
        self.failures.push(UnitFailure {
            source_id: source.id.clone(),
            timestamp,
            kind: err.kind().to_string(),
            error: err.to_string(),
        });
    }
}

/// Variable to request for a source, with units from the metadata query.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedVariable {
    name: String,
    units: Option<String>,
}

const DEFAULT_VARIABLE: &str = "sst";

pub struct Pipeline {
    config: PipelineConfig,
    registry: SourceRegistry,
    client: ErddapClient,
    chain: FallbackChain,
    normalizer: GridNormalizer,
    writer: ArtifactWriter,
    manifest: ManifestBuilder,
    selector: TimeSelector,
    skip_manifest: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, client: ErddapClient, options: RunOptions) -> Self {
        let registry = config.registry();
        let writer = ArtifactWriter::new(&config.output_dir, config.artifact.clone()).with_force(options.force);
        let manifest = ManifestBuilder::new(
            &config.output_dir,
            config.manifest.clone(),
            config.retention.max_age(),
        );

        Self {
            registry,
            client,
            chain: FallbackChain::new(RetryPolicy::from_http(&config.http)),
            normalizer: GridNormalizer::new(config.valid_band),
            writer,
            manifest,
            selector: options
                .selector
                .unwrap_or_else(|| TimeSelector::from_lookback(&config.lookback)),
            skip_manifest: options.skip_manifest,
            config,
        }
    }

    /// Restrict the run to the given source ids.
    pub fn with_sources(mut self, ids: &[String]) -> Self {
        if !ids.is_empty() {
            self.registry.retain_ids(ids);
        }
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Process every enabled source, then rebuild the manifest.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| StorageError::io(&self.config.output_dir, e))?;

        let mut summary = RunSummary::default();
        let mut with_data = BTreeSet::new();

        for source in self.registry.enabled() {
            let before = summary.written + summary.cached;
            self.run_source(source, now, &mut summary).await;
            if summary.written + summary.cached > before {
                with_data.insert(source.id.clone());
            }
        }
        summary.sources_with_data = with_data.len();

        let manifest = if self.skip_manifest {
            self.manifest.build(now)?
        } else {
            self.manifest.rebuild(now)?
        };
        summary.manifest_entries = manifest.entry_count();
        summary.manifest_latest = manifest.latest.clone();
        summary.manifest_current = manifest.is_current(now - self.config.lookback.duration());

        info!(
            written = summary.written,
            cached = summary.cached,
            empty = summary.empty,
            failed = summary.failed(),
            sources_with_data = summary.sources_with_data,
            manifest_entries = summary.manifest_entries,
            "Run complete"
        );

        Ok(summary)
    }

    #[instrument(skip_all, fields(source = %source.id))]
    async fn run_source(&self, source: &DataSource, now: DateTime<Utc>, summary: &mut RunSummary) {
        let timestamps = match self.discover(source, now).await {
            Ok(timestamps) => timestamps,
            Err(e) => {
                summary.record_failure(source, None, &e);
                return;
            }
        };

        let Some(newest) = timestamps.last().copied() else {
            info!("No timestamps in the lookback window");
            return;
        };

        if source.composite {
            let key = ArtifactKey::for_source(source, &newest, true);
            if self.cache_hit(&key, summary) {
                return;
            }
            let variable = self.resolve_variable(source).await;
            self.run_composite(source, &variable, &timestamps, newest, key, summary).await;
            return;
        }

        let pending: Vec<(DateTime<Utc>, ArtifactKey)> = timestamps
            .iter()
            .map(|ts| (*ts, ArtifactKey::for_source(source, ts, false)))
            .filter(|(_, key)| !self.cache_hit(key, summary))
            .collect();
        if pending.is_empty() {
            return;
        }

        let variable = self.resolve_variable(source).await;
        for (ts, key) in pending {
            match self.fetch_grid(source, &variable, ts).await {
                Ok(grid) => self.persist(source, &key, ts, &grid, 1, summary),
                Err(FetchError::NoValidData) => {
                    info!(timestamp = %format_iso(&ts), "Grid fully masked, nothing written");
                    summary.empty += 1;
                }
                Err(e) => summary.record_failure(source, Some(ts), &e),
            }
        }
    }

    /// Average every pass in the window into one artifact keyed by the
    /// newest pass.
    async fn run_composite(
        &self,
        source: &DataSource,
        variable: &ResolvedVariable,
        timestamps: &[DateTime<Utc>],
        newest: DateTime<Utc>,
        key: ArtifactKey,
        summary: &mut RunSummary,
    ) {
        let mut members = Vec::with_capacity(timestamps.len());
        for ts in timestamps {
            match self.fetch_grid(source, variable, *ts).await {
                Ok(grid) => members.push(grid),
                Err(e) => debug!(timestamp = %format_iso(ts), error = %e, "Composite member unavailable"),
            }
        }

        if members.is_empty() {
            summary.record_failure(
                source,
                Some(newest),
                &FetchError::AllSourcesExhausted {
                    what: format!("{} composite of {} passes", source.id, timestamps.len()),
                    candidates: timestamps.len(),
                    last: None,
                },
            );
            return;
        }

        let count = members.len();
        match aggregate_grids(members) {
            Ok(grid) => {
                info!(members = count, window = timestamps.len(), "Aggregated composite");
                self.persist(source, &key, newest, &grid, count, summary);
            }
            Err(e) => summary.record_failure(source, Some(newest), &FetchError::from(e)),
        }
    }

    async fn discover(&self, source: &DataSource, now: DateTime<Utc>) -> std::result::Result<Vec<DateTime<Utc>>, FetchError> {
        if !self.selector.needs_axis() {
            return Ok(self.selector.select(&[], now));
        }

        let client = &self.client;
        let dataset = source.id.as_str();
        let axis = self
            .chain
            .run(&source.base_urls, &format!("{} time axis", dataset), move |node| {
                client.time_axis(node, dataset)
            })
            .await?;

        let selected = self.selector.select(&axis.value, now);
        debug!(axis = axis.value.len(), selected = selected.len(), "Selected timestamps");
        Ok(selected)
    }

    /// First acceptable variable the metadata lists. Falls back to the first
    /// configured name when no mirror answers; the normalizer still checks
    /// the payload against the whole list.
    async fn resolve_variable(&self, source: &DataSource) -> ResolvedVariable {
        let client = &self.client;
        let dataset = source.id.as_str();
        let fallback_name = source
            .variable_names
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_VARIABLE);

        let metadata = self
            .chain
            .run(&source.base_urls, &format!("{} metadata", dataset), move |node| {
                client.metadata(node, dataset)
            })
            .await;

        match metadata {
            Ok(meta) => match meta.value.resolve_variable(&source.variable_names) {
                Some(name) => ResolvedVariable {
                    name: name.to_string(),
                    units: meta.value.units(name).map(str::to_string),
                },
                None => {
                    warn!(
                        tried = ?source.variable_names,
                        available = ?meta.value.variables,
                        "Metadata lists no acceptable variable, using {}",
                        fallback_name
                    );
                    ResolvedVariable {
                        name: fallback_name.to_string(),
                        units: None,
                    }
                }
            },
            Err(e) => {
                warn!(error = %e, "Metadata unavailable, using {}", fallback_name);
                ResolvedVariable {
                    name: fallback_name.to_string(),
                    units: None,
                }
            }
        }
    }

    async fn fetch_grid(
        &self,
        source: &DataSource,
        variable: &ResolvedVariable,
        ts: DateTime<Utc>,
    ) -> std::result::Result<NormalizedGrid, FetchError> {
        let client = &self.client;
        let normalizer = &self.normalizer;
        let region = &self.config.region;
        let what = format!("{} @ {}", source.id, format_iso(&ts));

        let fetched = self
            .chain
            .run(&source.base_urls, &what, move |node| async move {
                let query = GridQuery::new(source, &variable.name, ts, region);
                let mut payload = client.grid(node, &query).await?;
                if let Some(units) = &variable.units {
                    payload.fill_missing_units(&variable.name, units);
                }
                let grid = normalizer.normalize(&payload, &source.variable_names)?;
                Ok::<_, FetchError>(grid.ensure_has_data()?)
            })
            .await?;

        Ok(fetched.value)
    }

    fn cache_hit(&self, key: &ArtifactKey, summary: &mut RunSummary) -> bool {
        if !self.writer.is_cached(key) {
            return false;
        }
        debug!(file = %key.file_name(self.writer.kind()), "Artifact cached, skipping fetch");
        metrics::counter!("sst_cache_hits_total").increment(1);
        summary.cached += 1;
        true
    }

    fn persist(
        &self,
        source: &DataSource,
        key: &ArtifactKey,
        ts: DateTime<Utc>,
        grid: &NormalizedGrid,
        members: usize,
        summary: &mut RunSummary,
    ) {
        match self.writer.write(key, source, ts, grid, members) {
            Ok(WriteOutcome::Written(_)) => {
                metrics::counter!("sst_artifacts_written_total", "source" => source.id.clone()).increment(1);
                summary.written += 1;
            }
            Ok(WriteOutcome::Cached(_)) => summary.cached += 1,
            Err(StorageError::NoValidData) => summary.empty += 1,
            Err(e) => {
                metrics::counter!("sst_unit_failures_total", "kind" => "storage").increment(1);
                warn!(timestamp = %format_iso(&ts), error = %e, "Failed to write artifact");
                summary.failures.push(UnitFailure {
                    source_id: source.id.clone(),
                    timestamp: Some(ts),
                    kind: "storage".to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_failure_rule() {
        let mut summary = RunSummary::default();
        assert!(summary.is_hard_failure());

        summary.manifest_current = true;
        assert!(!summary.is_hard_failure());

        summary.manifest_current = false;
        summary.sources_with_data = 1;
        assert!(!summary.is_hard_failure());
    }
}
