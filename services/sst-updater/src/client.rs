//! Griddap provider client: URL construction plus the three query kinds.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use griddap_parser::{parse_time_axis, DatasetMetadata, GridDecoder, GridPayload, JsonTableDecoder};
use sst_common::{format_iso, BoundingBox, DataSource, HttpConfig, LatOrder};
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::transport::HttpTransport;

/// One grid subset request.
#[derive(Debug, Clone)]
pub struct GridQuery<'a> {
    pub dataset: &'a str,
    pub variable: &'a str,
    /// Concrete axis entry. The cache key needs it before any grid request.
    pub time: DateTime<Utc>,
    pub region: &'a BoundingBox,
    pub lat_order: LatOrder,
}

impl<'a> GridQuery<'a> {
    pub fn new(source: &'a DataSource, variable: &'a str, time: DateTime<Utc>, region: &'a BoundingBox) -> Self {
        Self {
            dataset: &source.id,
            variable,
            time,
            region,
            lat_order: source.lat_order,
        }
    }
}

pub struct ErddapClient {
    transport: Arc<dyn HttpTransport>,
    decoder: Arc<dyn GridDecoder>,
    axis_timeout: Duration,
    grid_timeout: Duration,
}

impl ErddapClient {
    /// Client requesting grids as JSON tables.
    pub fn new(transport: Arc<dyn HttpTransport>, http: &HttpConfig) -> Self {
        Self {
            transport,
            decoder: Arc::new(JsonTableDecoder),
            axis_timeout: http.axis_timeout(),
            grid_timeout: http.request_timeout(),
        }
    }

    /// Swap the grid decoder, which also changes the requested file type.
    pub fn with_decoder(mut self, decoder: Arc<dyn GridDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn time_axis_url(node: &str, dataset: &str) -> String {
        format!("{}/griddap/{}.json?time", node.trim_end_matches('/'), dataset)
    }

    pub fn info_url(node: &str, dataset: &str) -> String {
        format!("{}/info/{}/index.json", node.trim_end_matches('/'), dataset)
    }

    /// `{node}/griddap/{ds}.{fmt}?{var}[({time})][({lat_a}):({lat_b})][({west}):({east})]`
    ///
    /// Latitude bounds follow the dataset's storage order.
    pub fn grid_url(&self, node: &str, query: &GridQuery<'_>) -> String {
        let region = query.region;
        let (lat_a, lat_b) = match query.lat_order {
            LatOrder::Ascending => (region.south, region.north),
            LatOrder::Descending => (region.north, region.south),
        };

        format!(
            "{}/griddap/{}.{}?{}[({})][({}):({})][({}):({})]",
            node.trim_end_matches('/'),
            query.dataset,
            self.decoder.file_type(),
            query.variable,
            format_iso(&query.time),
            lat_a,
            lat_b,
            region.west,
            region.east
        )
    }

    /// Ascending time axis of a dataset.
    #[instrument(skip(self, node), fields(node = %node))]
    pub async fn time_axis(&self, node: &str, dataset: &str) -> Result<Vec<DateTime<Utc>>, FetchError> {
        let body = self.get(&Self::time_axis_url(node, dataset), self.axis_timeout).await?;
        let axis = parse_time_axis(&body)?;
        debug!(entries = axis.len(), "Fetched time axis");
        Ok(axis)
    }

    #[instrument(skip(self, node), fields(node = %node))]
    pub async fn metadata(&self, node: &str, dataset: &str) -> Result<DatasetMetadata, FetchError> {
        let body = self.get(&Self::info_url(node, dataset), self.axis_timeout).await?;
        Ok(DatasetMetadata::parse(&body)?)
    }

    #[instrument(skip(self, node, query), fields(node = %node, dataset = query.dataset, variable = query.variable))]
    pub async fn grid(&self, node: &str, query: &GridQuery<'_>) -> Result<GridPayload, FetchError> {
        let body = self.get(&self.grid_url(node, query), self.grid_timeout).await?;
        let payload = self.decoder.decode(&body)?;
        debug!(bytes = body.len(), lat = payload.lat.len(), lon = payload.lon.len(), "Decoded grid");
        Ok(payload)
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<Bytes, FetchError> {
        let response = self.transport.get(url, timeout).await?;
        if !response.is_success() {
            return Err(FetchError::Server {
                status: response.status,
                url: url.to_string(),
            });
        }
        Ok(response.body)
    }
}
