//! Common test fixtures for SST pipeline tests.

use sst_common::{BoundingBox, DataSource, LatOrder, ResolutionClass};

/// Common regions for testing.
pub mod regions {
    use super::BoundingBox;

    pub fn gulf_of_mexico() -> BoundingBox {
        BoundingBox::new(24.0, -98.0, 31.0, -80.0)
    }

    /// A 2x3 degree box used by the small synthetic grids.
    pub fn small() -> BoundingBox {
        BoundingBox::new(24.0, -98.0, 26.0, -95.0)
    }
}

/// Reference timestamps.
pub mod time {
    /// Run reference time used by pipeline tests.
    pub const NOW: &str = "2024-06-03T00:00:00Z";

    /// Daily passes inside a 72 hour lookback from [`NOW`].
    pub const DAILY: [&str; 3] = [
        "2024-05-31T12:00:00Z",
        "2024-06-01T12:00:00Z",
        "2024-06-02T12:00:00Z",
    ];

    /// Hourly passes on the last day.
    pub const HOURLY: [&str; 3] = [
        "2024-06-02T20:00:00Z",
        "2024-06-02T21:00:00Z",
        "2024-06-02T22:00:00Z",
    ];
}

/// Mock ERDDAP mirrors.
pub mod nodes {
    pub const PRIMARY: &str = "http://erddap-a.test/erddap";
    pub const SECONDARY: &str = "http://erddap-b.test/erddap";
    pub const TERTIARY: &str = "http://erddap-c.test/erddap";
}

/// A source served by the three mock nodes.
pub fn test_source(id: &str, resolution: ResolutionClass) -> DataSource {
    DataSource {
        id: id.to_string(),
        display_name: format!("Test {}", id),
        base_urls: vec![
            nodes::PRIMARY.to_string(),
            nodes::SECONDARY.to_string(),
            nodes::TERTIARY.to_string(),
        ],
        resolution,
        variable_names: vec!["sea_surface_temperature".to_string(), "sst".to_string()],
        lat_order: LatOrder::Ascending,
        composite: false,
        enabled: true,
    }
}

/// Same as [`test_source`] but averaged over its lookback window.
pub fn composite_source(id: &str) -> DataSource {
    DataSource {
        composite: true,
        ..test_source(id, ResolutionClass::Hourly)
    }
}
