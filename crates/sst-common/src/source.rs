//! Data source definitions and the static source registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Product class of a data source.
///
/// The declaration order is the default manifest priority: a gap-free
/// blended analysis beats a single near-real-time swath, which beats an
/// hourly geostationary pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionClass {
    /// Gap-free blended daily analysis (L4).
    Blended,
    /// Near-real-time single-swath product (L3).
    NearRealTime,
    /// Hourly geostationary product.
    Hourly,
}

impl ResolutionClass {
    pub const ALL: [ResolutionClass; 3] = [
        ResolutionClass::Blended,
        ResolutionClass::NearRealTime,
        ResolutionClass::Hourly,
    ];

    /// Whether artifacts of this class are keyed by calendar date only.
    pub fn is_daily(&self) -> bool {
        matches!(self, ResolutionClass::Blended)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionClass::Blended => "blended",
            ResolutionClass::NearRealTime => "near_real_time",
            ResolutionClass::Hourly => "hourly",
        }
    }
}

impl fmt::Display for ResolutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blended" => Ok(ResolutionClass::Blended),
            "near_real_time" | "nrt" => Ok(ResolutionClass::NearRealTime),
            "hourly" => Ok(ResolutionClass::Hourly),
            other => Err(format!("unknown resolution class: {}", other)),
        }
    }
}

/// Storage order of a dataset's latitude axis on the provider.
///
/// Grid queries must name the latitude range in storage order or the
/// server rejects the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatOrder {
    #[default]
    Ascending,
    Descending,
}

/// Plausible ocean temperature band in °F. Cells outside it are masked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBand {
    pub min_f: f64,
    pub max_f: f64,
}

impl TemperatureBand {
    pub fn new(min_f: f64, max_f: f64) -> Self {
        Self { min_f, max_f }
    }

    /// True for finite values inside the inclusive band.
    pub fn contains(&self, value_f: f64) -> bool {
        value_f.is_finite() && value_f >= self.min_f && value_f <= self.max_f
    }
}

impl Default for TemperatureBand {
    fn default() -> Self {
        Self::new(30.0, 100.0)
    }
}

/// A remote gridded SST product, reachable through one or more mirror nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    /// Dataset identifier on the provider (also the artifact key prefix).
    pub id: String,
    pub display_name: String,
    /// Mirror base URLs in priority order.
    pub base_urls: Vec<String>,
    pub resolution: ResolutionClass,
    /// Acceptable variable names in preference order.
    pub variable_names: Vec<String>,
    #[serde(default)]
    pub lat_order: LatOrder,
    /// Average every pass in the lookback window into one gap-filled artifact.
    #[serde(default)]
    pub composite: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// ERDDAP nodes that mirror the CoastWatch SST catalog.
pub const DEFAULT_NODES: [&str; 3] = [
    "https://coastwatch.noaa.gov/erddap",
    "https://coastwatch.pfeg.noaa.gov/erddap",
    "https://upwell.pfeg.noaa.gov/erddap",
];

fn default_variable_names() -> Vec<String> {
    vec!["sea_surface_temperature".to_string(), "sst".to_string()]
}

/// Ordered set of configured data sources.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<DataSource>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<DataSource>) -> Self {
        Self { sources }
    }

    /// The built-in registry: blended daily, near-real-time swath and hourly
    /// geostationary products, each mirrored on every default node.
    pub fn builtin() -> Self {
        let nodes: Vec<String> = DEFAULT_NODES.iter().map(|n| n.to_string()).collect();

        let mut blended_vars = vec!["analysed_sst".to_string()];
        blended_vars.extend(default_variable_names());

        Self::new(vec![
            DataSource {
                id: "noaacwBLENDEDsstDNDaily".to_string(),
                display_name: "Geo-polar Blended SST (Day+Night)".to_string(),
                base_urls: nodes.clone(),
                resolution: ResolutionClass::Blended,
                variable_names: blended_vars,
                lat_order: LatOrder::Ascending,
                composite: false,
                enabled: true,
            },
            DataSource {
                id: "noaacwLEOACSPOSSTL3SnrtCDaily".to_string(),
                display_name: "ACSPO Super-collated SST (NRT)".to_string(),
                base_urls: nodes.clone(),
                resolution: ResolutionClass::NearRealTime,
                variable_names: default_variable_names(),
                lat_order: LatOrder::Descending,
                composite: false,
                enabled: true,
            },
            DataSource {
                id: "noaacwg19sstHourly".to_string(),
                display_name: "GOES-19 Hourly SST".to_string(),
                base_urls: nodes,
                resolution: ResolutionClass::Hourly,
                variable_names: default_variable_names(),
                lat_order: LatOrder::Descending,
                composite: true,
                enabled: true,
            },
        ])
    }

    /// Enabled sources in configuration order.
    pub fn enabled(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn get(&self, id: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Keep only the named sources (used by the `--source` filter).
    pub fn retain_ids(&mut self, ids: &[String]) {
        if !ids.is_empty() {
            self.sources.retain(|s| ids.iter().any(|id| id == &s.id));
        }
    }
}
