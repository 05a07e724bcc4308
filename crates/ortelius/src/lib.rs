//! Ortelius - Geocoding Resolution Engine
//!
//! Ortelius turns free-form text into ranked geographic matches and
//! coordinates into structured addresses. It runs against any store
//! implementing the [`ortelius_gazetteer::GazetteerStore`] boundary and
//! resolves every match into an ordered address hierarchy, finest entry
//! first.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ortelius::{BlockingGeocoder, ReverseOptions, SearchOptions};
//! use ortelius_gazetteer::test_data::{TestDataConfig, example_country_store};
//!
//! let store = example_country_store(&TestDataConfig::default())?;
//! let geocoder = BlockingGeocoder::new(Arc::new(store))?;
//!
//! // Forward search: text in, ranked places out.
//! let results = geocoder.search("10 Example Street", &SearchOptions::default())?;
//! let best = &results[0];
//! println!("{}: {}", best.name().unwrap_or("?"), best.address().display_line());
//!
//! // Reverse: coordinate in, finest feature and its address out.
//! let place = geocoder.reverse(50.1051, 4.1052, &ReverseOptions::default())?;
//! assert!(!place.address().is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Operations
//!
//! - **`search`**: free-text forward geocoding with fuzzy matching
//! - **`search_address`**: structured search over pre-separated fields
//! - **`search_category`**: nameless search for feature kinds near an anchor
//! - **`reverse`**: coordinate to the finest covering feature
//! - **`lookup` / `details`**: resolve known identifiers
//! - **`status`**: engine and store liveness
//!
//! All operations exist in async form on [`Geocoder`] and blocking form on
//! [`BlockingGeocoder`]. Results are deterministic: equal inputs against
//! equal store data produce identically ordered responses.

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod address;
mod assemble;
mod config;
mod core;
pub mod error;
mod options;
mod results;
mod retrieve;
mod score;
mod session;
mod tokenize;

pub use self::core::{BlockingGeocoder, Geocoder};

pub use config::{GeocoderConfig, GeocoderConfigBuilder, PoolConfig, RetrievalLimits, ScoringBuilder};
pub use error::{InputError, OrteliusError};
pub use options::{
    DetailsOptions, FINEST_RANK, LookupOptions, MAX_LIMIT, Near, ReverseOptions, SearchOptions,
    StructuredQuery,
};
pub use ortelius_gazetteer as gazetteer;
pub use results::{
    AddressPart, Health, PlaceDetails, PlaceSummary, ResolvedAddress, ResolvedPlace, ReverseResult,
    SearchResult, StatusReport,
};
pub use score::ScoreWeights;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the engine.
///
/// Sets up structured logging with configurable levels and filtering.
/// Call once at the start of your application; later calls are no-ops.
///
/// # Examples
///
/// ```rust
/// use ortelius::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), ortelius::OrteliusError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), OrteliusError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}
