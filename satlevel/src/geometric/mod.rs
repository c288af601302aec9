pub mod bounding_box;
pub mod source_reader;
pub mod station_observations;
