use anyhow::{Context, Result};
use satlevel::collect::global_variables::get_temp_path;
use satlevel::geometric::bounding_box;
use satlevel::{ObservationPersistencePipeline, ServiceConfig, StationQueryClient};
use std::path::Path;

/// Example: active stations inside the extent of a vector file, saved as a point layer
/// Usage: get_active_stations [vector_path]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/test_aoi_2.shp".to_string());
    let bbox = bounding_box::from_vector(&path)?;

    let client = StationQueryClient::new(ServiceConfig::from_env())?;
    let stations = client.list_active_stations(&bbox)?;
    for station in &stations {
        println!(
            "{:>8}  {:<30} ({:.4}, {:.4})",
            station.station_id, station.name, station.longitude, station.latitude
        );
    }

    let stem = Path::new(&path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_out = get_temp_path().join(format!("{}_active_stations.geojson", stem));
    ObservationPersistencePipeline::new(client)
        .save_stations(bbox, &file_out)
        .with_context(|| format!("Failed to save stations to {:?}", file_out))?;

    println!("Active stations saved to {:?}", file_out);
    Ok(())
}
