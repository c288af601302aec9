//! Resolve an area of interest from vector layers, rasters or zipped satellite products,
//! normalise it to WGS84, and persist the water-level observations of every active
//! station inside it.

pub mod collect;
pub mod commons;
pub mod error;
pub mod geo_core;
pub mod geometric;

pub use collect::ocean_obs::ocean_obs_collect::{
    Observation, ServiceConfig, Station, StationQueryClient,
};
pub use commons::acquisition_window::AcquisitionWindow;
pub use error::{Result, SatlevelError};
pub use geo_core::{BoundingBox, CoordinateTransformer, Crs};
pub use geometric::bounding_box::BoundingBoxResolver;
pub use geometric::source_reader::{GeospatialSourceReader, ReferenceBand, SourceExtent, SourceKind};
pub use geometric::station_observations::{
    FailurePolicy, ObservationPersistencePipeline, RunSummary,
};
