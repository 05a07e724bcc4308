//! Per-request options for the public operations.
//!
//! These carry caller intent (language, limits, spatial restriction);
//! process-wide policy lives in [`GeocoderConfig`](crate::GeocoderConfig).

use ortelius_gazetteer::{BoundingBox, LatLon};

use crate::error::InputError;

/// Hard ceiling on the number of results any search may return.
pub const MAX_LIMIT: usize = 50;

/// Finest address rank in the 0..=30 scheme (house level).
pub const FINEST_RANK: u8 = 30;

/// Options shared by `search`, `search_address` and `search_category`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Bias results toward this box, or restrict to it when `bounded`.
    pub viewbox: Option<BoundingBox>,
    /// Exclude results outside the viewbox instead of down-weighting them.
    pub bounded: bool,
    /// Result count; `None` uses the configured default, values above
    /// [`MAX_LIMIT`] are clamped, `0` yields an empty response.
    pub limit: Option<usize>,
    /// Preferred name language; falls back to the default name.
    pub language: Option<String>,
    /// Restrict to these ISO country codes (case-insensitive).
    pub country_restriction: Vec<String>,
}

/// Reject boxes with out-of-range corners or a flipped orientation.
pub(crate) fn validate_viewbox(vb: &BoundingBox) -> Result<(), InputError> {
    let corners_valid = LatLon::new(vb.min_lat, vb.min_lon).is_valid()
        && LatLon::new(vb.max_lat, vb.max_lon).is_valid();
    if !corners_valid {
        return Err(InputError::InvalidViewbox(
            "corner coordinates outside WGS84 range".into(),
        ));
    }
    if vb.min_lat >= vb.max_lat || vb.min_lon >= vb.max_lon {
        return Err(InputError::InvalidViewbox(
            "minimum corner must be strictly south-west of maximum".into(),
        ));
    }
    Ok(())
}

impl SearchOptions {
    /// Validate and return the effective viewbox, if any.
    pub(crate) fn validated_viewbox(&self) -> Result<Option<BoundingBox>, InputError> {
        match self.viewbox {
            None => Ok(None),
            Some(vb) => {
                validate_viewbox(&vb)?;
                Ok(Some(vb))
            }
        }
    }

    pub(crate) fn normalized_countries(&self) -> Vec<String> {
        self.country_restriction
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Options for `reverse`.
#[derive(Debug, Clone)]
pub struct ReverseOptions {
    /// Finest address rank to consider.
    pub max_rank: u8,
    /// Maximum search radius in metres; `None` uses the configured ceiling.
    pub radius_ceiling_m: Option<f64>,
    pub language: Option<String>,
}

impl Default for ReverseOptions {
    fn default() -> Self {
        Self {
            max_rank: FINEST_RANK,
            radius_ceiling_m: None,
            language: None,
        }
    }
}

/// Options for `details`.
#[derive(Debug, Clone, Default)]
pub struct DetailsOptions {
    pub language: Option<String>,
    /// Also resolve and return the parent chain.
    pub include_hierarchy: bool,
}

/// Options for `lookup`.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    pub language: Option<String>,
}

/// Structured address fields for `search_address`. Any subset may be
/// filled; an entirely empty query is an input error.
#[derive(Debug, Clone, Default)]
pub struct StructuredQuery {
    pub house_number: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
}

impl StructuredQuery {
    pub(crate) fn is_empty(&self) -> bool {
        [
            &self.house_number,
            &self.street,
            &self.city,
            &self.region,
            &self.country,
            &self.postcode,
        ]
        .iter()
        .all(|f| f.as_deref().is_none_or(|s| s.trim().is_empty()))
    }
}

/// Spatial anchor of a category search.
#[derive(Debug, Clone, Copy)]
pub enum Near {
    /// Search within this box.
    Viewbox(BoundingBox),
    /// Search around this point within `radius_m`.
    Point { center: LatLon, radius_m: f64 },
}
