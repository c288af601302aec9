use anyhow::{Context, Result};
use satlevel::collect::global_variables::get_temp_path;
use satlevel::geometric::bounding_box;
use satlevel::{AcquisitionWindow, ObservationPersistencePipeline, ServiceConfig, StationQueryClient};

/// Example: observations of every active station inside a vector extent for a fixed window
/// Usage: get_station_data [vector_path] [start/end]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .unwrap_or_else(|| "data/test_aoi_2.shp".to_string());
    let window = AcquisitionWindow::parse(
        &args
            .next()
            .unwrap_or_else(|| "2018-02-12T00:00:00Z/2018-03-18T00:00:00Z".to_string()),
    )?;

    let bbox = bounding_box::from_vector(&path)?;
    println!("bbox = {}", bbox);

    let output_dir = get_temp_path().join("output");
    let pipeline = ObservationPersistencePipeline::new(StationQueryClient::new(
        ServiceConfig::from_env(),
    )?);
    let summary = pipeline
        .run(bbox, window, &output_dir)
        .context("Failed to retrieve station data")?;

    println!(
        "{} files written to {:?}, {} stations without data",
        summary.written.len(),
        output_dir,
        summary.empty_stations.len()
    );
    Ok(())
}
