use ortelius_gazetteer::{FeatureId, StoreError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrteliusError>;

/// Malformed input, surfaced immediately and never retried.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("invalid viewbox: {0}")]
    InvalidViewbox(String),
    #[error("category search requires at least one kind")]
    EmptyCategories,
}

/// The error taxonomy of the resolution engine.
///
/// `NoCoverage` and `NotFound` mean "no matching data" and are only raised
/// by operations whose contract demands a single result; `search*` return
/// empty sequences instead. Store faults are retried once with a reduced
/// scope before they surface here.
#[derive(Error, Debug)]
pub enum OrteliusError {
    #[error("input error: {0}")]
    Input(#[from] InputError),
    #[error("feature {0} not found")]
    NotFound(FeatureId),
    #[error("no feature within {radius_m} m of ({lat}, {lon})")]
    NoCoverage { lat: f64, lon: f64, radius_m: f64 },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("containment hierarchy deeper than {max_depth} at feature {at}; data cycle suspected")]
    HierarchyCycle { at: FeatureId, max_depth: usize },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("init logging error: {0}")]
    InitLogging(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrteliusError {
    /// Whether this is a transient store fault worth one scoped retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}
